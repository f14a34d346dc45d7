//! Domain types for the checkout core: the catalog snapshot, the mutable
//! order draft, and immutable price estimates.

pub mod catalog;
pub mod draft;
pub mod estimate;

pub use catalog::{DiscountGrant, LoyaltyAccount, ServiceOffering};
pub use draft::{OrderDraft, OrderLineItem};
pub use estimate::{EstimateSource, PriceEstimate};
