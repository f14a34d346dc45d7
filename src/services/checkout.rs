//! Checkout orchestration.
//!
//! The orchestrator is the single place allowed to transition order state:
//! draft -> estimated -> submitted -> confirmed/failed. It owns the draft,
//! the cached catalog and loyalty snapshots, the discount grant, and the
//! estimate staleness guard.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::client::{
    CreateOrderRequest, EstimateItem, EstimateRequest, LaundryApi, OrderItem, ServerEstimate,
};
use crate::config::AppConfig;
use crate::errors::{CheckoutError, FieldError};
use crate::events::{Event, EventSender};
use crate::models::{DiscountGrant, LoyaltyAccount, OrderDraft, PriceEstimate, ServiceOffering};
use crate::services::estimator;

/// Where a checkout session currently stands.
///
/// `PartialFailure` is deliberately distinct from `Failed`: the order exists
/// server-side, so a bare "place order" retry could double-create it. The
/// retained order id feeds the dedicated [`CheckoutOrchestrator::retry_payment`]
/// path instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckoutState {
    /// Building the draft; no server estimate is current.
    Browsing,
    /// A server estimate with this sequence number is in flight.
    Estimating { seq: u64 },
    /// The server's authoritative estimate is current.
    Estimated { estimate: PriceEstimate },
    /// Order creation call in flight.
    Submitting,
    /// Order created; payment confirmation in flight.
    AwaitingPaymentConfirmation { order_id: i64 },
    /// Terminal. The draft has been discarded.
    Confirmed { order_id: i64 },
    /// Order created but payment unconfirmed; retry payment, not placement.
    /// Carries the confirmed estimate total so the retry redeems against the
    /// same amount the placement would have.
    PartialFailure {
        order_id: i64,
        total: Decimal,
        message: String,
    },
    /// A server call failed; the draft is preserved for retry.
    Failed { message: String },
}

impl CheckoutState {
    fn is_submission_in_flight(&self) -> bool {
        matches!(
            self,
            CheckoutState::Submitting | CheckoutState::AwaitingPaymentConfirmation { .. }
        )
    }
}

/// Synchronous pre-submit validation. Never contacts the server; reports
/// every violated field so the UI can annotate inputs inline.
pub fn validate_draft(draft: &OrderDraft, now: DateTime<Utc>) -> Result<(), CheckoutError> {
    let mut errors = Vec::new();

    if draft.is_empty() {
        errors.push(FieldError::new(
            "items",
            "Please select at least one service",
        ));
    }

    if draft.pickup_address().trim().is_empty() {
        errors.push(FieldError::new(
            "pickup_address",
            "Pickup address is required",
        ));
    }

    if !draft.same_address() && draft.delivery_address().trim().is_empty() {
        errors.push(FieldError::new(
            "delivery_address",
            "Delivery address is required",
        ));
    }

    match draft.pickup_instant() {
        None => errors.push(FieldError::new("pickup_time", "Pickup time is required")),
        Some(instant) if instant <= now => errors.push(FieldError::new(
            "pickup_time",
            "Pickup time cannot be in the past",
        )),
        Some(_) => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CheckoutError::Validation(errors))
    }
}

/// Coordinates the checkout flow for one order draft.
///
/// Single-owner by design: one checkout session holds the orchestrator
/// mutably, so no locking discipline beyond "ignore stale responses" is
/// needed. Every state transition happens here and nowhere else.
pub struct CheckoutOrchestrator {
    api: Arc<dyn LaundryApi>,
    config: Arc<AppConfig>,
    events: EventSender,
    draft: OrderDraft,
    catalog: Vec<ServiceOffering>,
    loyalty: Option<LoyaltyAccount>,
    discount: Option<DiscountGrant>,
    state: CheckoutState,
    /// Sequence number of the most recently issued estimate request.
    /// Responses carrying an older number are discarded.
    latest_seq: u64,
}

impl CheckoutOrchestrator {
    pub fn new(api: Arc<dyn LaundryApi>, config: Arc<AppConfig>, events: EventSender) -> Self {
        Self {
            api,
            config,
            events,
            draft: OrderDraft::new(),
            catalog: Vec::new(),
            loyalty: None,
            discount: None,
            state: CheckoutState::Browsing,
            latest_seq: 0,
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn catalog(&self) -> &[ServiceOffering] {
        &self.catalog
    }

    pub fn loyalty(&self) -> Option<&LoyaltyAccount> {
        self.loyalty.as_ref()
    }

    pub fn discount(&self) -> Option<&DiscountGrant> {
        self.discount.as_ref()
    }

    // ==================== Catalog and loyalty snapshots ====================

    /// Fetch the service catalog for this session.
    #[instrument(skip(self))]
    pub async fn load_catalog(&mut self) -> Result<&[ServiceOffering], CheckoutError> {
        let services = self.api.list_services().await?;
        info!("loaded {} services", services.len());
        self.events
            .send_or_log(Event::CatalogLoaded {
                service_count: services.len(),
            })
            .await;
        self.catalog = services;
        Ok(&self.catalog)
    }

    /// Refresh the cached loyalty balance. Failure is surfaced but leaves
    /// the previous snapshot (if any) in place.
    #[instrument(skip(self))]
    pub async fn refresh_loyalty(&mut self) -> Result<&LoyaltyAccount, CheckoutError> {
        let account = self.api.loyalty_balance().await?;
        self.events
            .send_or_log(Event::LoyaltyBalanceRefreshed {
                current_points: account.current_points,
            })
            .await;
        Ok(self.loyalty.insert(account))
    }

    // ==================== Draft mutation ====================

    /// Add one unit of a catalog service to the draft. Pricing-relevant:
    /// drops the discount grant and invalidates any current estimate.
    pub fn add_service(&mut self, service_id: i64) -> Result<(), CheckoutError> {
        self.guard_not_submitting()?;
        let service = self
            .catalog
            .iter()
            .find(|s| s.id == service_id)
            .cloned()
            .ok_or_else(|| {
                CheckoutError::InvalidOperation(format!(
                    "service {} is not in the current catalog",
                    service_id
                ))
            })?;
        self.draft.add_service(&service);
        self.invalidate_pricing(true);
        Ok(())
    }

    /// Remove one unit of a service from the draft. Pricing-relevant.
    pub fn remove_service(&mut self, service_id: i64) -> Result<(), CheckoutError> {
        self.guard_not_submitting()?;
        self.draft.remove_service(service_id);
        self.invalidate_pricing(true);
        Ok(())
    }

    // Address, schedule, and instruction edits do not affect pricing, so
    // they pass straight through to the draft.

    pub fn set_pickup_address(&mut self, address: impl Into<String>) {
        self.draft.set_pickup_address(address);
    }

    pub fn set_delivery_address(&mut self, address: impl Into<String>) {
        self.draft.set_delivery_address(address);
    }

    pub fn set_same_address(&mut self, same: bool) {
        self.draft.set_same_address(same);
    }

    pub fn set_schedule(&mut self, date: chrono::NaiveDate, time: chrono::NaiveTime) {
        self.draft.set_schedule(date, time);
    }

    pub fn set_instructions(&mut self, text: impl Into<String>) {
        self.draft.set_instructions(text);
    }

    // ==================== Estimation ====================

    /// Provisional client-side estimate for instant UI feedback.
    pub fn local_estimate(&self) -> PriceEstimate {
        estimator::local_estimate(
            &self.draft,
            self.loyalty.as_ref(),
            self.discount.as_ref(),
            self.config.max_loyalty_fraction(),
        )
    }

    /// The figure to display right now: the server's estimate when one is
    /// current, otherwise the local preview (labeled unconfirmed by its
    /// [`EstimateSource`](crate::models::EstimateSource)).
    pub fn display_estimate(&self) -> PriceEstimate {
        match &self.state {
            CheckoutState::Estimated { estimate } => estimate.clone(),
            _ => self.local_estimate(),
        }
    }

    /// Request an authoritative estimate from the server.
    ///
    /// Takes `&mut self` across the await, so a second request cannot start
    /// while this one is in flight; drivers managing their own futures use
    /// [`begin_estimate`](Self::begin_estimate) /
    /// [`complete_estimate`](Self::complete_estimate) directly and get the
    /// same staleness protection.
    #[instrument(skip(self))]
    pub async fn estimate(&mut self) -> Result<PriceEstimate, CheckoutError> {
        if self.draft.is_empty() {
            return Err(CheckoutError::field(
                "items",
                "Please select at least one service",
            ));
        }
        self.guard_not_submitting()?;

        let request = self.estimate_request();
        let seq = self.begin_estimate().await;
        let result = self.api.estimate_order(&request).await;
        match self.complete_estimate(seq, result).await? {
            Some(estimate) => Ok(estimate),
            // Unreachable through this method: the &mut borrow is held for
            // the whole round trip, so nothing can supersede `seq`.
            None => Err(CheckoutError::InvalidOperation(
                "estimate superseded by a newer request".to_string(),
            )),
        }
    }

    /// Issue a new estimate sequence number and enter `Estimating`.
    pub async fn begin_estimate(&mut self) -> u64 {
        self.latest_seq += 1;
        let seq = self.latest_seq;
        self.state = CheckoutState::Estimating { seq };
        self.events.send_or_log(Event::EstimateRequested { seq }).await;
        seq
    }

    /// Feed an estimate response back into the state machine.
    ///
    /// Responses whose sequence number is no longer the latest are
    /// discarded (`Ok(None)`) without touching state: a slow earlier
    /// estimate must never overwrite a newer one. A current failure moves
    /// to `Failed` with the draft preserved; the UI falls back to the local
    /// preview.
    pub async fn complete_estimate(
        &mut self,
        seq: u64,
        result: Result<ServerEstimate, CheckoutError>,
    ) -> Result<Option<PriceEstimate>, CheckoutError> {
        let current = seq == self.latest_seq
            && matches!(self.state, CheckoutState::Estimating { seq: s } if s == seq);
        if !current {
            info!(seq, latest = self.latest_seq, "discarding stale estimate response");
            self.events.send_or_log(Event::EstimateDiscarded { seq }).await;
            return Ok(None);
        }

        match result {
            Ok(server) => {
                if let Some(grant) = server.discount {
                    self.draft.set_discount_code(grant.code.clone());
                    self.discount = Some(grant);
                }
                let estimate = server.breakdown;
                self.events
                    .send_or_log(Event::EstimateReceived {
                        seq,
                        total: estimate.total,
                    })
                    .await;
                self.state = CheckoutState::Estimated {
                    estimate: estimate.clone(),
                };
                Ok(Some(estimate))
            }
            Err(e) => {
                warn!(seq, "estimate failed: {}", e);
                self.events
                    .send_or_log(Event::EstimateFailed {
                        seq,
                        message: e.to_string(),
                    })
                    .await;
                self.state = CheckoutState::Failed {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    fn estimate_request(&self) -> EstimateRequest {
        EstimateRequest {
            items: self
                .draft
                .line_items()
                .iter()
                .map(|item| EstimateItem {
                    service_id: item.service_id,
                    quantity: item.quantity,
                })
                .collect(),
            discount_code: self.draft.discount_code().map(str::to_string),
            use_loyalty_points: self.draft.use_loyalty_points(),
        }
    }

    // ==================== Discounts and loyalty ====================

    /// Validate a discount code against the server and, on success, fold it
    /// into a fresh estimate.
    ///
    /// Reapplying the already-accepted code is a no-op returning the
    /// existing grant; a rejected code clears the draft's code so the user
    /// can retry with another.
    #[instrument(skip(self))]
    pub async fn apply_discount(&mut self, code: &str) -> Result<DiscountGrant, CheckoutError> {
        self.guard_not_submitting()?;

        let code = code.trim();
        if code.is_empty() {
            return Err(CheckoutError::field(
                "discount_code",
                "Please enter a discount code",
            ));
        }

        if let Some(existing) = &self.discount {
            if existing.code == code {
                return Ok(existing.clone());
            }
        }

        let order_total = estimator::subtotal(&self.draft);
        match self.api.apply_discount(code, order_total).await {
            Ok(grant) => {
                self.draft.set_discount_code(code);
                self.discount = Some(grant.clone());
                self.events
                    .send_or_log(Event::DiscountApplied {
                        code: grant.code.clone(),
                        amount: grant.amount,
                    })
                    .await;

                // The accepted code changes the authoritative numbers, so a
                // fresh estimate is requested immediately.
                if !self.draft.is_empty() {
                    self.estimate().await?;
                }
                Ok(grant)
            }
            Err(e) => {
                self.draft.clear_discount_code();
                self.events
                    .send_or_log(Event::DiscountRejected {
                        code: code.to_string(),
                        message: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Explicitly clear the applied discount so a different code may be
    /// tried. Pricing-relevant.
    pub async fn clear_discount(&mut self) -> Result<(), CheckoutError> {
        self.guard_not_submitting()?;
        self.discount = None;
        self.draft.clear_discount_code();
        self.events.send_or_log(Event::DiscountCleared).await;
        self.invalidate_pricing(false);
        Ok(())
    }

    /// Toggle loyalty redemption. Always forces a re-estimate when the
    /// draft has items: only the server knows the authoritative conversion
    /// and caps.
    #[instrument(skip(self))]
    pub async fn set_use_loyalty_points(&mut self, use_points: bool) -> Result<(), CheckoutError> {
        self.guard_not_submitting()?;
        self.draft.set_use_loyalty_points(use_points);
        self.invalidate_pricing(false);
        if !self.draft.is_empty() {
            self.estimate().await?;
        }
        Ok(())
    }

    /// Drop any current or in-flight estimate after a pricing-relevant
    /// mutation; estimates are invalidated, never silently stale-displayed.
    /// Item-set changes also revoke the discount grant (the draft keeps the
    /// code, so the next estimate revalidates it server-side).
    fn invalidate_pricing(&mut self, item_set_changed: bool) {
        if item_set_changed {
            self.discount = None;
        }
        match self.state {
            CheckoutState::Estimating { .. } => {
                // Strand the in-flight response.
                self.latest_seq += 1;
                self.state = CheckoutState::Browsing;
            }
            CheckoutState::Estimated { .. } | CheckoutState::Failed { .. } => {
                self.state = CheckoutState::Browsing;
            }
            _ => {}
        }
    }

    fn guard_not_submitting(&self) -> Result<(), CheckoutError> {
        if self.state.is_submission_in_flight() {
            return Err(CheckoutError::InvalidOperation(
                "an order submission is in flight".to_string(),
            ));
        }
        if let CheckoutState::PartialFailure { order_id, .. } = self.state {
            return Err(CheckoutError::InvalidOperation(format!(
                "order {} awaits payment retry; resolve it before editing the draft",
                order_id
            )));
        }
        Ok(())
    }

    // ==================== Submission ====================

    /// Place the order using the configured default payment method.
    pub async fn place_order(&mut self) -> Result<i64, CheckoutError> {
        let method = self.config.default_payment_method.clone();
        self.place_order_with(&method).await
    }

    /// Place the order: create it server-side, then confirm payment, then
    /// best-effort redeem loyalty points.
    ///
    /// Only permitted from `Estimated`. The action is disabled while a
    /// submission is in flight, which is what prevents a double tap from
    /// creating two orders.
    #[instrument(skip(self))]
    pub async fn place_order_with(&mut self, payment_method: &str) -> Result<i64, CheckoutError> {
        let estimate = match &self.state {
            CheckoutState::Estimated { estimate } => estimate.clone(),
            CheckoutState::Submitting | CheckoutState::AwaitingPaymentConfirmation { .. } => {
                return Err(CheckoutError::InvalidOperation(
                    "an order submission is already in flight".to_string(),
                ))
            }
            CheckoutState::PartialFailure { order_id, .. } => {
                return Err(CheckoutError::InvalidOperation(format!(
                    "order {} was already created; retry its payment instead",
                    order_id
                )))
            }
            _ => {
                return Err(CheckoutError::InvalidOperation(
                    "a server estimate is required before placing the order".to_string(),
                ))
            }
        };

        validate_draft(&self.draft, Utc::now())?;

        let request = self.create_order_request()?;
        self.state = CheckoutState::Submitting;

        let order_id = match self.api.create_order(&request).await {
            Ok(id) => id,
            Err(e) => {
                // Draft preserved intact so the user does not lose their
                // selections.
                error!("order creation failed: {}", e);
                self.state = CheckoutState::Failed {
                    message: e.to_string(),
                };
                return Err(e);
            }
        };

        info!(order_id, "order created");
        self.state = CheckoutState::AwaitingPaymentConfirmation { order_id };
        self.events.send_or_log(Event::OrderCreated { order_id }).await;

        self.confirm_and_redeem(order_id, payment_method, estimate.total)
            .await
    }

    /// Retry payment confirmation for an order that was created but not
    /// confirmed. Only permitted from `PartialFailure`.
    #[instrument(skip(self))]
    pub async fn retry_payment(&mut self) -> Result<i64, CheckoutError> {
        let (order_id, total) = match &self.state {
            CheckoutState::PartialFailure {
                order_id, total, ..
            } => (*order_id, *total),
            _ => {
                return Err(CheckoutError::InvalidOperation(
                    "no order is awaiting a payment retry".to_string(),
                ))
            }
        };

        let method = self.config.default_payment_method.clone();
        self.state = CheckoutState::AwaitingPaymentConfirmation { order_id };
        self.confirm_and_redeem(order_id, &method, total).await
    }

    async fn confirm_and_redeem(
        &mut self,
        order_id: i64,
        payment_method: &str,
        order_total: Decimal,
    ) -> Result<i64, CheckoutError> {
        if let Err(e) = self.api.confirm_order(order_id, payment_method).await {
            let message = e.to_string();
            error!(order_id, "payment confirmation failed: {}", message);
            self.events
                .send_or_log(Event::PaymentUnconfirmed {
                    order_id,
                    message: message.clone(),
                })
                .await;
            self.state = CheckoutState::PartialFailure {
                order_id,
                total: order_total,
                message: message.clone(),
            };
            return Err(CheckoutError::PartialFailure { order_id, message });
        }

        // Redemption failure is reported but never rolls back the
        // confirmation: the order itself already succeeded.
        if self.draft.use_loyalty_points() {
            if let Some(account) = &self.loyalty {
                let points = estimator::redeemable_points(
                    account,
                    order_total,
                    self.config.max_loyalty_fraction(),
                );
                if points > 0 {
                    match self.api.redeem_points(points, order_total).await {
                        Ok(()) => {
                            // Balance changed server-side; force a refresh
                            // before the snapshot is trusted again.
                            self.loyalty = None;
                        }
                        Err(e) => {
                            warn!(order_id, "loyalty redemption failed: {}", e);
                            self.events
                                .send_or_log(Event::LoyaltyRedemptionFailed {
                                    order_id,
                                    message: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
            }
        }

        info!(order_id, "order confirmed");
        self.events.send_or_log(Event::OrderConfirmed { order_id }).await;
        self.state = CheckoutState::Confirmed { order_id };
        self.draft = OrderDraft::new();
        self.discount = None;
        Ok(order_id)
    }

    fn create_order_request(&self) -> Result<CreateOrderRequest, CheckoutError> {
        let pickup_instant = self.draft.pickup_instant().ok_or_else(|| {
            CheckoutError::field("pickup_time", "Pickup time is required")
        })?;

        Ok(CreateOrderRequest {
            pickup_address: self.draft.pickup_address().to_string(),
            delivery_address: self.draft.delivery_address().to_string(),
            pickup_time: CreateOrderRequest::format_pickup_time(pickup_instant),
            special_instructions: self.draft.special_instructions().map(str::to_string),
            use_loyalty_points: self.draft.use_loyalty_points(),
            discount_code: self.draft.discount_code().map(str::to_string),
            items: self
                .draft
                .line_items()
                .iter()
                .map(|item| OrderItem {
                    service_id: item.service_id,
                    item_name: item.name.clone(),
                    quantity: item.quantity,
                })
                .collect(),
        })
    }

    /// Begin a fresh order after a terminal state. Discards whatever draft
    /// remains and returns to `Browsing`; catalog and loyalty snapshots are
    /// kept for the session.
    pub fn start_new_order(&mut self) {
        self.draft = OrderDraft::new();
        self.discount = None;
        self.state = CheckoutState::Browsing;
    }
}
