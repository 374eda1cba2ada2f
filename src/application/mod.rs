//! Payment attempt orchestration.
//!
//! `PaymentOrchestrator` owns the lifecycle of the current attempt and drives
//! the provider adapters; `CheckoutController` is the page-side boundary that
//! consumes its readiness and results.

pub mod checkout;
pub mod embedded;
pub mod hosted;
pub mod initializer;
pub mod loader;
pub mod orchestrator;
pub mod readiness;
pub mod validator;
