//! Shared test fixtures: a scripted in-memory backend standing in for the
//! QuickWash pricing oracle, plus config/builder helpers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use quickwash_checkout::client::{
    CreateOrderRequest, EstimateRequest, LaundryApi, ServerEstimate,
};
use quickwash_checkout::models::{
    DiscountGrant, EstimateSource, LoyaltyAccount, PriceEstimate, ServiceOffering,
};
use quickwash_checkout::{AppConfig, CheckoutError};

pub const DELIVERY_FEE: Decimal = dec!(50);

pub fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        api_base_url: "http://localhost/laundryapp".to_string(),
        ..AppConfig::default()
    })
}

pub fn catalog() -> Vec<ServiceOffering> {
    vec![
        ServiceOffering {
            id: 1,
            name: "Wash & Fold".to_string(),
            price_per_item: dec!(200),
        },
        ServiceOffering {
            id: 2,
            name: "Dry Cleaning".to_string(),
            price_per_item: dec!(350),
        },
    ]
}

#[derive(Debug, Default)]
pub struct CallLog {
    pub estimate_calls: usize,
    pub create_calls: usize,
    pub confirm_calls: usize,
    pub redeem_calls: usize,
    pub last_create_request: Option<CreateOrderRequest>,
    pub last_redeemed_points: Option<i64>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_estimate: bool,
    fail_create: bool,
    fail_confirm: bool,
    fail_redeem: bool,
}

/// An in-memory stand-in for the remote pricing oracle.
///
/// Prices like the real backend would: subtotal over the cataloged prices,
/// a flat delivery fee, discounts from a code table, and a 10%-capped
/// loyalty discount. Individual calls can be scripted to fail.
pub struct FakeBackend {
    services: Vec<ServiceOffering>,
    loyalty: LoyaltyAccount,
    discount_codes: HashMap<String, Decimal>,
    next_order_id: Mutex<i64>,
    faults: Mutex<Faults>,
    pub calls: Mutex<CallLog>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let mut discount_codes = HashMap::new();
        discount_codes.insert("WASH20".to_string(), dec!(80));
        Self {
            services: catalog(),
            loyalty: LoyaltyAccount {
                current_points: 500,
                points_value: dec!(50),
            },
            discount_codes,
            next_order_id: Mutex::new(42),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(CallLog::default()),
        }
    }

    pub fn with_loyalty(mut self, account: LoyaltyAccount) -> Self {
        self.loyalty = account;
        self
    }

    pub fn fail_next_estimate(&self) {
        self.faults.lock().unwrap().fail_next_estimate = true;
    }

    pub fn fail_create(&self, fail: bool) {
        self.faults.lock().unwrap().fail_create = fail;
    }

    pub fn fail_confirm(&self, fail: bool) {
        self.faults.lock().unwrap().fail_confirm = fail;
    }

    pub fn fail_redeem(&self, fail: bool) {
        self.faults.lock().unwrap().fail_redeem = fail;
    }

    pub fn estimate_calls(&self) -> usize {
        self.calls.lock().unwrap().estimate_calls
    }

    pub fn create_calls(&self) -> usize {
        self.calls.lock().unwrap().create_calls
    }

    fn price_of(&self, service_id: i64) -> Option<Decimal> {
        self.services
            .iter()
            .find(|s| s.id == service_id)
            .map(|s| s.price_per_item)
    }
}

#[async_trait]
impl LaundryApi for FakeBackend {
    async fn list_services(&self) -> Result<Vec<ServiceOffering>, CheckoutError> {
        Ok(self.services.clone())
    }

    async fn loyalty_balance(&self) -> Result<LoyaltyAccount, CheckoutError> {
        Ok(self.loyalty.clone())
    }

    async fn estimate_order(
        &self,
        request: &EstimateRequest,
    ) -> Result<ServerEstimate, CheckoutError> {
        self.calls.lock().unwrap().estimate_calls += 1;

        if std::mem::take(&mut self.faults.lock().unwrap().fail_next_estimate) {
            return Err(CheckoutError::Network("connection reset".to_string()));
        }

        let mut subtotal = Decimal::ZERO;
        for item in &request.items {
            let price = self.price_of(item.service_id).ok_or_else(|| {
                CheckoutError::Application(format!("unknown service {}", item.service_id))
            })?;
            subtotal += price * Decimal::from(item.quantity);
        }

        let discount = match &request.discount_code {
            Some(code) => match self.discount_codes.get(code) {
                Some(amount) => Some(DiscountGrant {
                    code: code.clone(),
                    amount: (*amount).min(subtotal),
                }),
                None => {
                    return Err(CheckoutError::Application(
                        "Invalid discount code".to_string(),
                    ))
                }
            },
            None => None,
        };
        let discount_amount = discount.as_ref().map(|d| d.amount).unwrap_or(Decimal::ZERO);

        let loyalty_discount = if request.use_loyalty_points {
            self.loyalty.points_value.min(subtotal * dec!(0.1))
        } else {
            Decimal::ZERO
        };

        Ok(ServerEstimate {
            breakdown: PriceEstimate::assemble(
                subtotal,
                DELIVERY_FEE,
                discount_amount,
                loyalty_discount,
                Decimal::ZERO,
                EstimateSource::Server,
            ),
            discount,
        })
    }

    async fn apply_discount(
        &self,
        code: &str,
        _order_total: Decimal,
    ) -> Result<DiscountGrant, CheckoutError> {
        match self.discount_codes.get(code) {
            Some(amount) => Ok(DiscountGrant {
                code: code.to_string(),
                amount: *amount,
            }),
            None => Err(CheckoutError::Application(
                "Invalid discount code".to_string(),
            )),
        }
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<i64, CheckoutError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.create_calls += 1;
            calls.last_create_request = Some(request.clone());
        }

        if self.faults.lock().unwrap().fail_create {
            return Err(CheckoutError::Application(
                "Failed to place order".to_string(),
            ));
        }

        let mut next = self.next_order_id.lock().unwrap();
        let id = *next;
        *next += 1;
        Ok(id)
    }

    async fn confirm_order(
        &self,
        _order_id: i64,
        _payment_method: &str,
    ) -> Result<(), CheckoutError> {
        self.calls.lock().unwrap().confirm_calls += 1;

        if self.faults.lock().unwrap().fail_confirm {
            return Err(CheckoutError::Application(
                "Failed to process payment".to_string(),
            ));
        }
        Ok(())
    }

    async fn redeem_points(&self, points: i64, _order_total: Decimal) -> Result<(), CheckoutError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.redeem_calls += 1;
            calls.last_redeemed_points = Some(points);
        }

        if self.faults.lock().unwrap().fail_redeem {
            return Err(CheckoutError::Application(
                "Redemption service unavailable".to_string(),
            ));
        }
        Ok(())
    }
}
