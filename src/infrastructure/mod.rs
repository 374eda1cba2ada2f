pub mod browser;
pub mod http;
pub mod in_memory;
pub mod message_bus;
