//! The pricing and checkout services: the pure local estimator and the
//! orchestrator that owns every order-state transition.

pub mod checkout;
pub mod estimator;

pub use checkout::{validate_draft, CheckoutOrchestrator, CheckoutState};
