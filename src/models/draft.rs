use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::ServiceOffering;

/// One selected service in the draft. At most one line item per service;
/// `unit_price` is the catalog price snapshotted at the *first* add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub service_id: i64,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The client-owned, in-progress order under construction.
///
/// Pure state: no network calls and no currency math beyond the price
/// snapshots live here, which keeps the draft trivially testable in
/// isolation. Created empty when checkout starts, discarded on confirmation
/// or abandonment, never persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDraft {
    line_items: Vec<OrderLineItem>,
    pickup_address: String,
    delivery_address: String,
    same_address: bool,
    pickup_date: Option<NaiveDate>,
    pickup_time: Option<NaiveTime>,
    special_instructions: Option<String>,
    discount_code: Option<String>,
    use_loyalty_points: bool,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self {
            same_address: true,
            ..Self::default()
        }
    }

    /// Adds one unit of `service`: increments an existing line item or
    /// inserts a new one with quantity 1, snapshotting the current price.
    pub fn add_service(&mut self, service: &ServiceOffering) {
        if let Some(item) = self
            .line_items
            .iter_mut()
            .find(|item| item.service_id == service.id)
        {
            item.quantity += 1;
        } else {
            self.line_items.push(OrderLineItem {
                service_id: service.id,
                name: service.name.clone(),
                unit_price: service.price_per_item,
                quantity: 1,
            });
        }
    }

    /// Removes one unit of the service: decrements, deleting the line item
    /// at quantity 1 rather than storing zero. No-op if absent.
    pub fn remove_service(&mut self, service_id: i64) {
        if let Some(pos) = self
            .line_items
            .iter()
            .position(|item| item.service_id == service_id)
        {
            if self.line_items[pos].quantity > 1 {
                self.line_items[pos].quantity -= 1;
            } else {
                self.line_items.remove(pos);
            }
        }
    }

    pub fn line_items(&self) -> &[OrderLineItem] {
        &self.line_items
    }

    pub fn quantity_of(&self, service_id: i64) -> u32 {
        self.line_items
            .iter()
            .find(|item| item.service_id == service_id)
            .map(|item| item.quantity)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    pub fn set_pickup_address(&mut self, address: impl Into<String>) {
        self.pickup_address = address.into();
        if self.same_address {
            self.delivery_address = self.pickup_address.clone();
        }
    }

    /// Ignored while `same_address` is set; the delivery address is derived
    /// from pickup then and must not drift independently.
    pub fn set_delivery_address(&mut self, address: impl Into<String>) {
        if !self.same_address {
            self.delivery_address = address.into();
        }
    }

    /// When set, copies pickup into delivery and keeps the latter derived.
    /// When cleared, delivery becomes independently editable starting from
    /// its last value.
    pub fn set_same_address(&mut self, same: bool) {
        self.same_address = same;
        if same {
            self.delivery_address = self.pickup_address.clone();
        }
    }

    pub fn same_address(&self) -> bool {
        self.same_address
    }

    pub fn pickup_address(&self) -> &str {
        &self.pickup_address
    }

    pub fn delivery_address(&self) -> &str {
        if self.same_address {
            &self.pickup_address
        } else {
            &self.delivery_address
        }
    }

    pub fn set_schedule(&mut self, date: NaiveDate, time: NaiveTime) {
        self.pickup_date = Some(date);
        self.pickup_time = Some(time);
    }

    /// The combined pickup instant, once both date and time-of-day are set.
    pub fn pickup_instant(&self) -> Option<DateTime<Utc>> {
        match (self.pickup_date, self.pickup_time) {
            (Some(date), Some(time)) => Some(Utc.from_utc_datetime(&date.and_time(time))),
            _ => None,
        }
    }

    pub fn set_instructions(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.special_instructions = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
    }

    pub fn special_instructions(&self) -> Option<&str> {
        self.special_instructions.as_deref()
    }

    pub fn set_discount_code(&mut self, code: impl Into<String>) {
        let code = code.into();
        self.discount_code = if code.trim().is_empty() {
            None
        } else {
            Some(code)
        };
    }

    pub fn clear_discount_code(&mut self) {
        self.discount_code = None;
    }

    pub fn discount_code(&self) -> Option<&str> {
        self.discount_code.as_deref()
    }

    pub fn set_use_loyalty_points(&mut self, use_points: bool) {
        self.use_loyalty_points = use_points;
    }

    pub fn use_loyalty_points(&self) -> bool {
        self.use_loyalty_points
    }
}
