use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry fetched from the backend. Immutable for the session;
/// drafts snapshot `price_per_item` at the moment a service is added, so a
/// later catalog refresh never retroactively reprices an in-progress order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: i64,
    pub name: String,
    pub price_per_item: Decimal,
}

/// Cached snapshot of the user's loyalty balance. Owned and mutated only by
/// the backend (on redemption); the client refreshes it, never edits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub current_points: i64,
    /// Currency value of `current_points` under the backend's conversion rate.
    pub points_value: Decimal,
}

/// The accepted result of validating a promotional code against the backend.
/// Exists only after a successful apply call; dropped when the draft's item
/// set changes, forcing the next estimate to revalidate the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountGrant {
    pub code: String,
    pub amount: Decimal,
}
