//! Integration tests for the checkout server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p checkout-integration-tests
//! ```
//!
//! The full router runs in-process against the fakes in
//! `checkout_server::testing`; no database, payment provider or commerce
//! backend is needed.
//!
//! # Test Categories
//!
//! - `checkout_flow` - Cart to session to paid order
//! - `webhook_dispatch` - Signature handling and topic routing
//! - `sync` - Cart and wishlist snapshots across devices

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use checkout_server::middleware::USER_ID_HEADER;
use checkout_server::signature::{PAYMENT_SIGNATURE_HEADER, sign_payment};
use checkout_server::testing::PAYMENT_WEBHOOK_SECRET;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Send a request and return status plus JSON body (`Null` when not JSON).
///
/// # Panics
///
/// Panics if the router fails or the body cannot be read.
#[allow(clippy::unwrap_used)]
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

/// A JSON request, optionally on behalf of `user`.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[allow(clippy::unwrap_used)]
pub fn json_request(method: &str, uri: &str, user: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// A GET on behalf of `user`.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[allow(clippy::unwrap_used)]
pub fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::get(uri)
        .header(USER_ID_HEADER, user)
        .body(Body::empty())
        .unwrap()
}

/// A payment webhook delivery signed now with the harness secret.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[allow(clippy::unwrap_used)]
pub fn signed_payment_event(event: &Value) -> Request<Body> {
    let body = serde_json::to_vec(event).unwrap();
    let signature = sign_payment(
        &SecretString::from(PAYMENT_WEBHOOK_SECRET),
        &body,
        chrono::Utc::now().timestamp(),
    );
    Request::post("/api/webhooks/payments")
        .header(PAYMENT_SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

/// A `checkout.session.completed` event for `session_id`.
#[must_use]
pub fn completed_event(event_id: &str, session_id: &str) -> Value {
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1_767_225_600,
        "livemode": false,
        "data": {"object": {"id": session_id, "object": "checkout.session"}}
    })
}
