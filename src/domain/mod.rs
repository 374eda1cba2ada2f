//! Domain types of a checkout payment attempt and the ports it talks through.

pub mod amount;
pub mod message;
pub mod ports;
pub mod result;
pub mod session;
