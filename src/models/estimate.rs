use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side produced an estimate. Exactly one estimate is "current" at a
/// time; a server estimate always supersedes the local preview for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateSource {
    /// Provisional, computed client-side. Delivery fee and tax are unknown
    /// (reported as zero) and the UI must label the total unconfirmed.
    Local,
    /// Authoritative, computed by the backend.
    Server,
}

/// An immutable breakdown of charges. A new user action produces a new
/// estimate; an estimate is never mutated in place.
///
/// Invariant: `total = subtotal + delivery_fee + tax - discount_amount -
/// loyalty_discount`, clamped so `total >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount_amount: Decimal,
    pub loyalty_discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub source: EstimateSource,
}

impl PriceEstimate {
    /// Builds an estimate from its parts, clamping the combined discounts so
    /// the total never goes negative.
    pub fn assemble(
        subtotal: Decimal,
        delivery_fee: Decimal,
        discount_amount: Decimal,
        loyalty_discount: Decimal,
        tax: Decimal,
        source: EstimateSource,
    ) -> Self {
        let charges = subtotal + delivery_fee + tax;
        let total = (charges - discount_amount - loyalty_discount).max(Decimal::ZERO);
        Self {
            subtotal,
            delivery_fee,
            discount_amount,
            loyalty_discount,
            tax,
            total,
            source,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.source == EstimateSource::Server
    }
}
