//! `HttpNotifier` against a local `wiremock` server.

use serde_json::json;
use storefront_orderservice::{
    api::notifications::HttpNotifier,
    notifications::{ConfirmationAddress, ConfirmationLine, Notifier, OrderConfirmation},
};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn confirmation() -> OrderConfirmation {
    OrderConfirmation {
        order_number: "ORD-20250307-K7QX2M".into(),
        customer_name: "Ana Rojas".into(),
        email: "ana@example.cl".into(),
        phone: None,
        shipping_address: ConfirmationAddress {
            address_line1: "Av. Providencia 1234".into(),
            address_line2: None,
            city: "Santiago".into(),
            region: "Metropolitana".into(),
            postal_code: None,
        },
        shipping_method_name: "Courier".into(),
        coupon_code: None,
        lines: vec![ConfirmationLine {
            product_name: "Tee".into(),
            sku: "TEE-M".into(),
            size: Some("M".into()),
            color: None,
            unit_price_clp: 12_990,
            quantity: 2,
            line_total_clp: 25_980,
        }],
        subtotal_clp: 25_980,
        shipping_price_clp: 3_990,
        discount_clp: 0,
        total_clp: 29_970,
    }
}

#[tokio::test]
async fn posts_confirmation_with_idempotency_key() {
    let server = MockServer::start().await;
    let key = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/order-confirmations"))
        .and(header("Idempotency-Key", key.to_string().as_str()))
        .and(body_partial_json(json!({
            "order_number": "ORD-20250307-K7QX2M",
            "total_clp": 29_970
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(reqwest::Client::new(), format!("{}/", server.uri()));
    let result = notifier.send_order_confirmation(key, confirmation()).await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/order-confirmations"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(reqwest::Client::new(), server.uri());
    let result = notifier
        .send_order_confirmation(Uuid::new_v4(), confirmation())
        .await;

    assert!(result.is_err(), "a 503 must not count as delivered");
}

#[tokio::test]
async fn unreachable_service_is_a_failure() {
    // Bind and release a port so nothing is listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let notifier = HttpNotifier::new(reqwest::Client::new(), format!("http://{addr}"));
    let err = notifier
        .send_order_confirmation(Uuid::new_v4(), confirmation())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("NotificationService"), "got: {err}");
}
