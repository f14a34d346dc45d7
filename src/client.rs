//! Typed adapter for the QuickWash backend.
//!
//! All transport and envelope handling lives here: every response is a JSON
//! envelope carrying a `status`/`success` flag, an optional human-readable
//! `message`, and an optional `data` payload. A non-success envelope is an
//! application-level failure regardless of the HTTP status code. Known
//! naming drift in the backend (`order_id` vs `orderId`, `current_points`
//! vs `points`) is absorbed with serde aliases so nothing loosely typed
//! leaks past this boundary.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::errors::CheckoutError;
use crate::models::{DiscountGrant, EstimateSource, LoyaltyAccount, PriceEstimate, ServiceOffering};

/// Wire format for the pickup instant expected by the backend.
pub const PICKUP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The backend surface consumed by the checkout orchestrator.
///
/// The trait seam exists so orchestrator flows are testable against a
/// scripted fake; `ApiClient` is the production implementation.
#[async_trait]
pub trait LaundryApi: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceOffering>, CheckoutError>;

    async fn loyalty_balance(&self) -> Result<LoyaltyAccount, CheckoutError>;

    async fn estimate_order(
        &self,
        request: &EstimateRequest,
    ) -> Result<ServerEstimate, CheckoutError>;

    async fn apply_discount(
        &self,
        code: &str,
        order_total: Decimal,
    ) -> Result<DiscountGrant, CheckoutError>;

    /// Returns the created order id.
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<i64, CheckoutError>;

    async fn confirm_order(&self, order_id: i64, payment_method: &str)
        -> Result<(), CheckoutError>;

    async fn redeem_points(&self, points: i64, order_total: Decimal) -> Result<(), CheckoutError>;
}

/// One item of an estimate request.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateItem {
    pub service_id: i64,
    pub quantity: u32,
}

/// Body of `POST /orders/estimate`.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateRequest {
    pub items: Vec<EstimateItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    pub use_loyalty_points: bool,
}

/// One item of an order-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub service_id: i64,
    pub item_name: String,
    pub quantity: u32,
}

/// Body of `POST /orders/create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub use_loyalty_points: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    pub items: Vec<OrderItem>,
}

impl CreateOrderRequest {
    /// Formats a pickup instant the way the backend expects it.
    pub fn format_pickup_time(instant: DateTime<Utc>) -> String {
        instant.format(PICKUP_TIME_FORMAT).to_string()
    }
}

/// A server-confirmed estimate: the authoritative breakdown, plus the
/// discount grant the server applied while computing it (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEstimate {
    pub breakdown: PriceEstimate,
    pub discount: Option<DiscountGrant>,
}

/// A past order as returned by the order-list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderSummary {
    #[serde(alias = "order_id", alias = "orderId")]
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub pickup_time: Option<String>,
}

/// Production `LaundryApi` implementation over HTTP/JSON.
///
/// The bearer token is injected at construction by the session provider;
/// pricing and order logic never reach into ambient storage for it.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Build a client with a per-request timeout from configuration.
    pub fn new(config: &AppConfig, token: impl Into<String>) -> Result<Self, CheckoutError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("failed to construct HTTP client: {}", e)))?;

        Ok(Self::with_client(config, token, client))
    }

    /// Build from an existing `reqwest::Client` (useful for testing).
    pub fn with_client(config: &AppConfig, token: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, CheckoutError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.headers())
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_envelope::<T>(response).await?.require_data(path)
    }

    async fn post_data<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CheckoutError> {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_envelope::<T>(response).await?.require_data(path)
    }

    /// POST where only the envelope's success flag matters.
    async fn post_ack<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), CheckoutError> {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_envelope::<serde_json::Value>(response).await.map(|_| ())
    }

    /// List the user's past orders (newest first, as the backend returns them).
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>, CheckoutError> {
        let data: OrdersData = self.get_data("/orders").await?;
        Ok(data.orders)
    }

    /// Cancel a previously created order.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: i64) -> Result<(), CheckoutError> {
        self.post_ack("/orders/cancel", &serde_json::json!({ "order_id": order_id }))
            .await
    }
}

#[async_trait]
impl LaundryApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_services(&self) -> Result<Vec<ServiceOffering>, CheckoutError> {
        let data: ServicesData = self.get_data("/services").await?;
        debug!("fetched {} services", data.services.len());
        Ok(data.services)
    }

    #[instrument(skip(self))]
    async fn loyalty_balance(&self) -> Result<LoyaltyAccount, CheckoutError> {
        let data: LoyaltyData = self.get_data("/user/loyalty-points").await?;
        Ok(LoyaltyAccount {
            current_points: data.current_points,
            points_value: data.points_value,
        })
    }

    #[instrument(skip(self, request))]
    async fn estimate_order(
        &self,
        request: &EstimateRequest,
    ) -> Result<ServerEstimate, CheckoutError> {
        let data: EstimateData = self.post_data("/orders/estimate", request).await?;
        let mut breakdown = PriceEstimate::assemble(
            data.subtotal,
            data.delivery_fee,
            data.discount_amount,
            data.loyalty_discount,
            data.tax,
            EstimateSource::Server,
        );
        // The server's total is authoritative (it may round differently than
        // the component sum); the recomputed figure only fills in when the
        // field is missing from the wire.
        if let Some(total) = data.total {
            if total != breakdown.total {
                warn!(
                    wire = %total,
                    computed = %breakdown.total,
                    "server total differs from component sum"
                );
            }
            breakdown.total = total.max(Decimal::ZERO);
        }
        Ok(ServerEstimate {
            breakdown,
            discount: data.discount,
        })
    }

    #[instrument(skip(self))]
    async fn apply_discount(
        &self,
        code: &str,
        order_total: Decimal,
    ) -> Result<DiscountGrant, CheckoutError> {
        let body = ApplyDiscountRequest {
            code: code.to_string(),
            order_total,
        };
        let data: DiscountData = self.post_data("/discounts/apply", &body).await?;
        Ok(data.discount)
    }

    #[instrument(skip(self, request))]
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<i64, CheckoutError> {
        let data: OrderData = self.post_data("/orders/create", request).await?;
        Ok(data.order_id)
    }

    #[instrument(skip(self))]
    async fn confirm_order(
        &self,
        order_id: i64,
        payment_method: &str,
    ) -> Result<(), CheckoutError> {
        self.post_ack(
            "/orders/confirm",
            &serde_json::json!({ "order_id": order_id, "payment_method": payment_method }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn redeem_points(&self, points: i64, order_total: Decimal) -> Result<(), CheckoutError> {
        self.post_ack(
            "/loyalty/redeem",
            &RedeemRequest {
                points,
                order_total,
            },
        )
        .await
    }
}

// ==================== Wire types ====================

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: Option<String>,
    success: Option<bool>,
    message: Option<String>,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success") || self.success == Some(true)
    }

    fn require_data(self, path: &str) -> Result<T, CheckoutError> {
        self.data.ok_or_else(|| {
            CheckoutError::Application(format!("server response for {} had no data", path))
        })
    }
}

#[derive(Debug, Deserialize)]
struct ServicesData {
    services: Vec<ServiceOffering>,
}

#[derive(Debug, Deserialize)]
struct LoyaltyData {
    // The backend is inconsistent about this field's name.
    #[serde(alias = "points", alias = "currentPoints")]
    current_points: i64,
    #[serde(alias = "pointsValue")]
    points_value: Decimal,
}

#[derive(Debug, Deserialize)]
struct EstimateData {
    #[serde(default)]
    subtotal: Decimal,
    #[serde(default, alias = "deliveryFee")]
    delivery_fee: Decimal,
    #[serde(default, alias = "discountAmount")]
    discount_amount: Decimal,
    #[serde(default, alias = "loyaltyDiscount")]
    loyalty_discount: Decimal,
    #[serde(default)]
    tax: Decimal,
    total: Option<Decimal>,
    #[serde(default)]
    discount: Option<DiscountGrant>,
}

#[derive(Debug, Serialize)]
struct ApplyDiscountRequest {
    code: String,
    order_total: Decimal,
}

#[derive(Debug, Deserialize)]
struct DiscountData {
    discount: DiscountGrant,
}

#[derive(Debug, Deserialize)]
struct OrderData {
    #[serde(alias = "orderId", deserialize_with = "id_from_number_or_string")]
    order_id: i64,
}

#[derive(Debug, Serialize)]
struct RedeemRequest {
    points: i64,
    order_total: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrdersData {
    #[serde(default)]
    orders: Vec<OrderSummary>,
}

/// The backend sometimes stringifies numeric identifiers.
fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn map_transport_error(error: reqwest::Error) -> CheckoutError {
    if error.is_timeout() {
        CheckoutError::Network("request timed out".to_string())
    } else {
        CheckoutError::Network(error.to_string())
    }
}

async fn decode_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<ApiEnvelope<T>, CheckoutError> {
    let http_status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(map_transport_error)?;

    let envelope: ApiEnvelope<T> = serde_json::from_slice(&body).map_err(|e| {
        warn!(%http_status, "undecodable server response: {}", e);
        CheckoutError::Application(format!(
            "unexpected server response (HTTP {})",
            http_status.as_u16()
        ))
    })?;

    // A non-success envelope is an application failure regardless of the
    // HTTP status code the backend happened to use.
    if !envelope.is_success() {
        return Err(CheckoutError::application(
            envelope.message,
            "request was rejected by the server",
        ));
    }

    Ok(envelope)
}
