use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Checkout lifecycle events published by the orchestrator.
///
/// Consumers (a UI shell, analytics, tests) subscribe to the receiving end of
/// the channel; the orchestrator never blocks on a slow or absent consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CatalogLoaded { service_count: usize },
    LoyaltyBalanceRefreshed { current_points: i64 },
    EstimateRequested { seq: u64 },
    EstimateReceived { seq: u64, total: Decimal },
    /// A response arrived for a request superseded by a newer one.
    EstimateDiscarded { seq: u64 },
    EstimateFailed { seq: u64, message: String },
    DiscountApplied { code: String, amount: Decimal },
    DiscountRejected { code: String, message: String },
    DiscountCleared,
    OrderCreated { order_id: i64 },
    OrderConfirmed { order_id: i64 },
    /// Order exists server-side but its payment was not confirmed.
    PaymentUnconfirmed { order_id: i64, message: String },
    /// Redemption after a confirmed order failed; the order stands.
    LoyaltyRedemptionFailed { order_id: i64, message: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Bounded channel pair for a checkout session.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event without waiting, logging and dropping it when the
    /// channel is full or the receiver is gone. Event delivery is never
    /// allowed to block or fail a checkout action.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("event dropped: {}", e);
        }
    }
}
