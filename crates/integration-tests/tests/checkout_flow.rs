//! Cart to hosted checkout to paid order, through the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use checkout_core::{Address, CustomerId, ProductId, VariationId};
use checkout_integration_tests::{completed_event, json_request, send, signed_payment_event};
use checkout_server::testing::{Harness, coupon, line_item, paid_session};
use serde_json::json;

fn cart() -> serde_json::Value {
    json!({
        "items": [
            {"productId": 11, "name": "Tee", "quantity": 2, "unitPrice": "25.00", "sku": "TEE-M"},
            {"productId": 12, "variationId": 120, "name": "Hat", "quantity": 1, "unitPrice": "15.50"}
        ],
        "billing": {
            "firstName": "Ada", "lastName": "Lovelace", "address1": "1 Analytical Way",
            "city": "London", "postalCode": "N1", "country": "GB", "email": "ada@example.com"
        },
        "shipping": {"firstName": "Ada", "lastName": "Lovelace", "country": "GB"},
        "couponCode": "SUMMER10"
    })
}

#[tokio::test]
async fn test_cart_to_order() {
    let harness = Harness::new();
    harness.commerce.add_coupon(coupon("summer10"));

    // 1. Storefront creates a session for user 42
    let (status, body) = send(
        harness.router(),
        json_request("POST", "/api/checkout/session", Some("42"), &cart()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let created = harness.payments.created_sessions();
    assert_eq!(created.len(), 1);
    let request = &created[0];
    assert_eq!(request.amount_total(), Some(6550));
    assert_eq!(request.line_items.len(), 2);
    assert_eq!(request.client_reference_id.as_deref(), Some("42"));

    // 2. The provider reports payment; its session echoes our metadata
    let metadata: Vec<(&str, &str)> = request
        .metadata
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    harness.payments.serve(
        paid_session(&session_id, &metadata),
        vec![
            line_item("a", 2, &[("product_id", "11"), ("sku", "TEE-M")]),
            line_item("b", 1, &[("product_id", "12"), ("variation_id", "120")]),
        ],
    );

    let (status, _) = send(
        harness.router(),
        signed_payment_event(&completed_event("evt_1", &session_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 3. Exactly one paid order landed on the backend
    let orders = harness.commerce.orders();
    assert_eq!(orders.len(), 1);
    let (key, order) = &orders[0];
    assert_eq!(key, &format!("checkout-{session_id}"));
    assert!(order.set_paid);
    assert_eq!(order.customer_id, Some(CustomerId::new(42)));
    assert_eq!(order.transaction_id.as_deref(), Some("pi_test_1"));
    assert_eq!(order.coupon_lines.len(), 1);
    assert_eq!(order.coupon_lines[0].code, "SUMMER10");

    assert_eq!(order.line_items.len(), 2);
    assert_eq!(order.line_items[0].product_id, ProductId::new(11));
    assert_eq!(order.line_items[0].quantity, 2);
    assert_eq!(order.line_items[0].sku.as_deref(), Some("TEE-M"));
    assert_eq!(order.line_items[1].variation_id, Some(VariationId::new(120)));

    let billing: &Address = &order.billing;
    assert_eq!(billing.first_name, "Ada");
    assert_eq!(billing.city, "London");
    assert_eq!(
        billing.email.as_ref().map(ToString::to_string).as_deref(),
        Some("buyer@example.com")
    );
    assert_eq!(order.shipping.last_name, "Lovelace");
}

#[tokio::test]
async fn test_redelivered_event_creates_one_order() {
    let harness = Harness::new();
    harness.payments.serve(
        paid_session("cs_dup", &[]),
        vec![line_item("a", 1, &[("product_id", "11")])],
    );

    for event_id in ["evt_1", "evt_1", "evt_2"] {
        let (status, _) = send(
            harness.router(),
            signed_payment_event(&completed_event(event_id, "cs_dup")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(harness.commerce.orders().len(), 1);
}

#[tokio::test]
async fn test_guest_checkout_with_unknown_coupon() {
    let harness = Harness::new();
    let mut body = cart();
    body["couponCode"] = json!("NOPE");

    let (status, _) = send(
        harness.router(),
        json_request("POST", "/api/checkout/session", None, &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let created = harness.payments.created_sessions();
    assert_eq!(created[0].client_reference_id, None);
    assert!(!created[0].metadata.contains_key("user_id"));
}

#[tokio::test]
async fn test_unpaid_session_creates_no_order() {
    let harness = Harness::new();
    let mut session = paid_session("cs_unpaid", &[]);
    session.payment_status = checkout_server::payments::PaymentStatus::Unpaid;
    harness
        .payments
        .serve(session, vec![line_item("a", 1, &[("product_id", "11")])]);

    let (status, _) = send(
        harness.router(),
        signed_payment_event(&completed_event("evt_1", "cs_unpaid")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(harness.commerce.orders().is_empty());
}

#[tokio::test]
async fn test_backend_outage_surfaces_for_retry() {
    let harness = Harness::new();
    harness.payments.serve(
        paid_session("cs_retry", &[]),
        vec![line_item("a", 1, &[("product_id", "11")])],
    );
    harness.commerce.set_failing(true);

    let (status, _) = send(
        harness.router(),
        signed_payment_event(&completed_event("evt_1", "cs_retry")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The provider retries once the backend is back
    harness.commerce.set_failing(false);
    let (status, _) = send(
        harness.router(),
        signed_payment_event(&completed_event("evt_1", "cs_retry")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.commerce.orders().len(), 1);
}
