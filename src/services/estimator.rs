//! Client-side price preview.
//!
//! One source of truth for the arithmetic that used to drift across screen
//! variants. Pure functions of the draft and cached snapshots: same inputs,
//! same estimate, no I/O, so everything here is unit-testable without
//! mocking a network.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{
    DiscountGrant, EstimateSource, LoyaltyAccount, OrderDraft, PriceEstimate,
};

/// Sum of `quantity x unit_price` over the draft's line items, using the
/// prices snapshotted at add time.
pub fn subtotal(draft: &OrderDraft) -> Decimal {
    draft
        .line_items()
        .iter()
        .map(|item| item.line_total())
        .sum()
}

/// Provisional estimate computed without a server round trip.
///
/// Delivery fee and tax are unknown client-side and reported as zero; the
/// estimate is marked [`EstimateSource::Local`] so the UI can label the
/// total unconfirmed. Rules:
///
/// - loyalty discount applies only when the draft opts in *and* a balance
///   snapshot is available, capped at `subtotal x max_loyalty_fraction` so
///   points can never zero out an order;
/// - the discount grant amount is whatever the server granted, clamped to
///   the subtotal (the local estimator never validates codes itself);
/// - the total is clamped at zero.
pub fn local_estimate(
    draft: &OrderDraft,
    loyalty: Option<&LoyaltyAccount>,
    discount: Option<&DiscountGrant>,
    max_loyalty_fraction: Decimal,
) -> PriceEstimate {
    let subtotal = subtotal(draft);
    let loyalty_discount = loyalty_discount(draft, loyalty, subtotal, max_loyalty_fraction);
    let discount_amount = discount
        .map(|grant| grant.amount.min(subtotal))
        .unwrap_or(Decimal::ZERO);

    PriceEstimate::assemble(
        subtotal,
        Decimal::ZERO,
        discount_amount,
        loyalty_discount,
        Decimal::ZERO,
        EstimateSource::Local,
    )
}

fn loyalty_discount(
    draft: &OrderDraft,
    loyalty: Option<&LoyaltyAccount>,
    subtotal: Decimal,
    max_loyalty_fraction: Decimal,
) -> Decimal {
    if !draft.use_loyalty_points() {
        return Decimal::ZERO;
    }
    let Some(account) = loyalty else {
        return Decimal::ZERO;
    };
    let cap = subtotal * max_loyalty_fraction;
    account.points_value.min(cap).max(Decimal::ZERO)
}

/// Points to redeem after a confirmed order: the capped formula
/// `min(current_points, total x fraction)`, truncated to whole points.
pub fn redeemable_points(
    loyalty: &LoyaltyAccount,
    order_total: Decimal,
    max_loyalty_fraction: Decimal,
) -> i64 {
    let cap = (order_total * max_loyalty_fraction).trunc();
    Decimal::from(loyalty.current_points)
        .min(cap)
        .max(Decimal::ZERO)
        .to_i64()
        .unwrap_or(0)
}
