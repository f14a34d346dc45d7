//! QuickWash Checkout Core
//!
//! The pricing and checkout engine of the QuickWash laundry-service client:
//! an in-memory [`OrderDraft`](models::OrderDraft), a pure local price
//! estimator for instant feedback, and a
//! [`CheckoutOrchestrator`](services::CheckoutOrchestrator) that reconciles
//! the local preview with the backend's authoritative estimates and drives
//! an order from draft to confirmation.
//!
//! The backend is an external oracle reached over HTTP/JSON via
//! [`ApiClient`](client::ApiClient); its auth token comes from the session
//! provider and is injected at construction. No UI, navigation, or token
//! persistence lives here.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;

pub use client::{ApiClient, LaundryApi};
pub use config::AppConfig;
pub use errors::{CheckoutError, FieldError};
pub use events::{Event, EventSender};
pub use services::{CheckoutOrchestrator, CheckoutState};
