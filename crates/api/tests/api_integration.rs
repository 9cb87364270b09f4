//! Integration tests for the API server.

use std::sync::OnceLock;
use std::time::Duration;

use api::Collaborators;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{CheckoutConfig, OrderStatus, RetryPolicy};
use common::{OrderId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Collaborators) {
    let config = CheckoutConfig {
        call_timeout: Duration::from_millis(500),
        mark_paid_retry: RetryPolicy::new(2, Duration::from_millis(1)),
        charge_retry: RetryPolicy::new(2, Duration::from_millis(1)),
        ..CheckoutConfig::default()
    };
    let (state, collaborators) = api::create_default_state(config);
    let app = api::create_app(state, get_metrics_handle());
    (app, collaborators)
}

fn checkout_body(user_id: u32) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id,
        "email": "someone@example.com",
        "address": {
            "street_address": "1600 Amphitheatre Parkway",
            "city": "Mountain View",
            "state": "CA",
            "country": "United States",
            "zip_code": "94043"
        },
        "credit_card": {
            "credit_card_number": "4432801561520454",
            "credit_card_cvv": "672",
            "credit_card_expiration_year": 2039,
            "credit_card_expiration_month": 1
        }
    })
}

fn checkout_request(body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_checkout_success() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "MUG", 2);
    c.cart.add_item(UserId::new(1), "TOTE", 1);

    let response = app.oneshot(checkout_request(&checkout_body(1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["order_id"], "ORD1");
    assert_eq!(json["transaction_id"], "TXN1");

    let order = c.ledger.order(&OrderId::new("ORD1")).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.draft.total.cents(), 2 * 1500 + 2450);
    assert_eq!(c.cart.item_count(UserId::new(1)), 0);
    assert_eq!(c.bus.message_count(), 1);
}

#[tokio::test]
async fn test_checkout_propagates_traceparent() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "NOTEBOOK", 1);

    let mut request = checkout_request(&checkout_body(1));
    request.headers_mut().insert(
        "traceparent",
        "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
            .parse()
            .unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let messages = c.bus.messages();
    let traceparent = &messages[0].headers["traceparent"];
    assert!(traceparent.starts_with("00-0af7651916cd43dd8448eb211c80319c-"));
    assert!(!traceparent.contains("b7ad6b7169203331"));
}

#[tokio::test]
async fn test_checkout_empty_cart_is_bad_request() {
    let (app, c) = setup();

    let response = app.oneshot(checkout_request(&checkout_body(1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "validation");
    assert_eq!(c.ledger.order_count(), 0);
}

#[tokio::test]
async fn test_checkout_invalid_user_is_bad_request() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "MUG", 1);

    let response = app.oneshot(checkout_request(&checkout_body(0))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(c.cart.get_calls(), 0);
}

#[tokio::test]
async fn test_checkout_malformed_body_rejected() {
    let (app, _) = setup();

    let response = app
        .oneshot(checkout_request(&serde_json::json!({ "user_id": 1 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "malformed_body");
    assert!(json["error"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn test_checkout_non_json_body_is_bad_request() {
    let (app, c) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/checkout")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], "malformed_body");
    assert_eq!(c.cart.get_calls(), 0);
}

#[tokio::test]
async fn test_demo_cart_checks_out() {
    let (app, c) = setup();
    api::seed_demo_cart(&c.cart);

    let response = app
        .oneshot(checkout_request(&checkout_body(api::DEMO_USER_ID)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let order = c.ledger.order(&OrderId::new("ORD1")).unwrap();
    assert_eq!(order.draft.total.cents(), 2 * 1299 + 2450);
    assert_eq!(c.cart.item_count(UserId::new(api::DEMO_USER_ID)), 0);
}

#[tokio::test]
async fn test_checkout_declined_payment() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "MUG", 1);
    c.payment.set_decline(true);

    let response = app.oneshot(checkout_request(&checkout_body(1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "payment_failure");
    assert_eq!(json["order_id"], "ORD1");
    assert_eq!(
        c.ledger.order(&OrderId::new("ORD1")).unwrap().status,
        OrderStatus::PaymentFailed
    );
    assert_eq!(c.cart.item_count(UserId::new(1)), 1);
}

#[tokio::test]
async fn test_checkout_catalog_down_is_bad_gateway() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "MUG", 1);
    c.catalog.set_unavailable(true);

    let response = app.oneshot(checkout_request(&checkout_body(1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(c.ledger.order_count(), 0);
}

#[tokio::test]
async fn test_checkout_unrecorded_payment_reports_ids() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "MUG", 1);
    c.ledger.fail_mark_paid_times(10);

    let response = app.oneshot(checkout_request(&checkout_body(1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["kind"], "partial_failure");
    assert_eq!(json["order_id"], "ORD1");
    assert_eq!(json["transaction_id"], "TXN1");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, c) = setup();
    c.cart.add_item(UserId::new(1), "MUG", 1);

    let response = app
        .clone()
        .oneshot(checkout_request(&checkout_body(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_runs_total"));
}
