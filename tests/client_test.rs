//! HTTP contract tests for the backend adapter, run against a mock server.
//!
//! These pin the envelope handling (non-success means failure regardless of
//! HTTP status), the bearer-token header, and the adapter's tolerance for
//! the backend's known naming drift.

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quickwash_checkout::client::{EstimateItem, EstimateRequest, LaundryApi};
use quickwash_checkout::{ApiClient, AppConfig, CheckoutError};

async fn client_for(server: &MockServer) -> ApiClient {
    let config = AppConfig {
        api_base_url: server.uri(),
        ..AppConfig::default()
    };
    ApiClient::new(&config, "test-token").unwrap()
}

fn estimate_request() -> EstimateRequest {
    EstimateRequest {
        items: vec![EstimateItem {
            service_id: 1,
            quantity: 2,
        }],
        discount_code: Some("WASH20".to_string()),
        use_loyalty_points: false,
    }
}

// ==================== Auth and Happy Paths ====================

#[tokio::test]
async fn test_list_services_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "services": [
                    {"id": 1, "name": "Wash & Fold", "price_per_item": 200},
                    {"id": 2, "name": "Dry Cleaning", "price_per_item": 350}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let services = client_for(&server).await.list_services().await.unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].name, "Wash & Fold");
    assert_eq!(services[1].price_per_item, dec!(350));
}

#[tokio::test]
async fn test_loyalty_balance_tolerates_field_drift() {
    let server = MockServer::start().await;
    // The deployed backend answers with `points`, not `current_points`.
    Mock::given(method("GET"))
        .and(path("/user/loyalty-points"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"points": 500, "pointsValue": 50}
        })))
        .mount(&server)
        .await;

    let account = client_for(&server).await.loyalty_balance().await.unwrap();
    assert_eq!(account.current_points, 500);
    assert_eq!(account.points_value, dec!(50));
}

#[tokio::test]
async fn test_estimate_order_decodes_breakdown_and_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/estimate"))
        .and(body_partial_json(json!({
            "items": [{"service_id": 1, "quantity": 2}],
            "discount_code": "WASH20",
            "use_loyalty_points": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "subtotal": 400,
                "deliveryFee": 50,
                "discountAmount": 80,
                "loyaltyDiscount": 0,
                "tax": 0,
                "total": 370,
                "discount": {"code": "WASH20", "amount": 80}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let estimate = client_for(&server)
        .await
        .estimate_order(&estimate_request())
        .await
        .unwrap();
    assert_eq!(estimate.breakdown.subtotal, dec!(400));
    assert_eq!(estimate.breakdown.delivery_fee, dec!(50));
    assert_eq!(estimate.breakdown.discount_amount, dec!(80));
    assert_eq!(estimate.breakdown.total, dec!(370));
    assert_eq!(estimate.discount.unwrap().code, "WASH20");
}

#[tokio::test]
async fn test_estimate_keeps_server_total_over_component_sum() {
    let server = MockServer::start().await;
    // The backend rounds its own way; its total wins even when the
    // components sum to a different figure.
    Mock::given(method("POST"))
        .and(path("/orders/estimate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "subtotal": 400,
                "deliveryFee": 50,
                "total": 449
            }
        })))
        .mount(&server)
        .await;

    let estimate = client_for(&server)
        .await
        .estimate_order(&estimate_request())
        .await
        .unwrap();
    assert_eq!(estimate.breakdown.total, dec!(449));
}

#[tokio::test]
async fn test_create_order_accepts_stringified_camel_case_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/create"))
        .and(body_partial_json(json!({
            "pickup_address": "12 Riverside Drive",
            "pickup_time": "2026-09-01 10:30:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Order placed",
            "data": {"orderId": "42"}
        })))
        .mount(&server)
        .await;

    let request = quickwash_checkout::client::CreateOrderRequest {
        pickup_address: "12 Riverside Drive".to_string(),
        delivery_address: "12 Riverside Drive".to_string(),
        pickup_time: "2026-09-01 10:30:00".to_string(),
        special_instructions: None,
        use_loyalty_points: false,
        discount_code: None,
        items: vec![quickwash_checkout::client::OrderItem {
            service_id: 1,
            item_name: "Wash & Fold".to_string(),
            quantity: 2,
        }],
    };
    let order_id = client_for(&server).await.create_order(&request).await.unwrap();
    assert_eq!(order_id, 42);
}

#[tokio::test]
async fn test_confirm_order_posts_method_and_checks_ack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/confirm"))
        .and(body_partial_json(json!({
            "order_id": 42,
            "payment_method": "mpesa"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Payment confirmed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .await
        .confirm_order(42, "mpesa")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_and_cancel_orders() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "orders": [
                    {"orderId": 42, "status": "confirmed", "total": 450},
                    {"order_id": 41, "status": "delivered", "total": 200}
                ]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders/cancel"))
        .and(body_partial_json(json!({"order_id": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Order cancelled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let orders = client.list_orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, 42);
    assert_eq!(orders[1].total, dec!(200));

    client.cancel_order(42).await.unwrap();
}

// ==================== Error Mapping ====================

#[tokio::test]
async fn test_rejection_surfaces_server_message_verbatim() {
    let server = MockServer::start().await;
    // The backend reports business rejections with HTTP 200.
    Mock::given(method("POST"))
        .and(path("/discounts/apply"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "Invalid discount code"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .apply_discount("BOGUS", dec!(400))
        .await
        .unwrap_err();
    assert_matches!(err, CheckoutError::Application(message)
        if message == "Invalid discount code");
}

#[tokio::test]
async fn test_rejection_without_message_gets_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/confirm"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "status": "error"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .confirm_order(42, "mpesa")
        .await
        .unwrap_err();
    assert_matches!(err, CheckoutError::Application(message)
        if message == "request was rejected by the server");
}

#[tokio::test]
async fn test_non_json_body_maps_to_application_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(
            ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).await.list_services().await.unwrap_err();
    assert_matches!(err, CheckoutError::Application(message)
        if message.contains("HTTP 502"));
}

#[tokio::test]
async fn test_success_envelope_without_data_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).await.list_services().await.unwrap_err();
    assert_matches!(err, CheckoutError::Application(message)
        if message.contains("no data"));
}

#[tokio::test]
async fn test_unreachable_backend_maps_to_network_error() {
    // Nothing listens on the discard port.
    let config = AppConfig {
        api_base_url: "http://127.0.0.1:9".to_string(),
        ..AppConfig::default()
    };
    let client = ApiClient::new(&config, "test-token").unwrap();

    let err = client.list_services().await.unwrap_err();
    assert_matches!(err, CheckoutError::Network(_));
}
