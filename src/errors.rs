use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validation failure tied to a specific draft field, so the UI can render
/// the message inline next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Error taxonomy for the checkout core.
///
/// Every backend-call failure is translated into one of these at the client
/// adapter or orchestrator boundary; raw transport errors never reach the
/// caller. Nothing here is fatal; the order draft is preserved for retry in
/// all cases except after a terminal confirmation.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Local precondition failures. No network call was made.
    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// The server could not be reached, or the request timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The server was reachable but reported a non-success status
    /// (invalid discount code, estimate rejected, payment declined).
    /// Carries the server-supplied message verbatim when available.
    #[error("{0}")]
    Application(String),

    /// The order was created but payment confirmation failed. Retrying
    /// "place order" from scratch could double-create the order, so the
    /// created order id is retained for a dedicated payment-retry path.
    #[error("order {order_id} was created but payment was not confirmed: {message}")]
    PartialFailure { order_id: i64, message: String },

    /// An action was attempted in a state that does not permit it
    /// (e.g. placing an order while a submission is already in flight).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Shorthand for a single-field validation error.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        CheckoutError::Validation(vec![FieldError::new(field, message)])
    }

    /// Application error with a generic fallback when the server supplied
    /// no usable message.
    pub fn application(message: Option<String>, fallback: &str) -> Self {
        CheckoutError::Application(match message {
            Some(m) if !m.trim().is_empty() => m,
            _ => fallback.to_string(),
        })
    }
}

fn format_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_fields() {
        let err = CheckoutError::Validation(vec![
            FieldError::new("pickup_address", "Pickup address is required"),
            FieldError::new("items", "Please select at least one service"),
        ]);
        let text = err.to_string();
        assert!(text.contains("pickup_address"));
        assert!(text.contains("at least one service"));
    }

    #[test]
    fn test_application_prefers_server_message() {
        let err =
            CheckoutError::application(Some("Invalid discount code".into()), "Request failed");
        assert_eq!(err.to_string(), "Invalid discount code");
    }

    #[test]
    fn test_application_falls_back_on_blank_message() {
        let err = CheckoutError::application(Some("   ".into()), "Request failed");
        assert_eq!(err.to_string(), "Request failed");
    }

    #[test]
    fn test_partial_failure_retains_order_id() {
        let err = CheckoutError::PartialFailure {
            order_id: 42,
            message: "payment declined".into(),
        };
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("payment was not confirmed"));
    }
}
