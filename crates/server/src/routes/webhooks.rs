//! Webhook routes.
//!
//! Bodies are taken as raw bytes: signatures cover the exact bytes sent,
//! so nothing may parse or re-encode the body before verification.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::Result;
use crate::signature::{COMMERCE_SIGNATURE_HEADER, PAYMENT_SIGNATURE_HEADER};
use crate::state::AppState;
use crate::webhooks::{CommerceHeaders, DELIVERY_ID_HEADER, TOPIC_HEADER};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Payment provider events.
#[instrument(skip_all)]
pub async fn payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    state
        .webhooks()
        .handle_payment(header(&headers, PAYMENT_SIGNATURE_HEADER), &body, Utc::now())
        .await?;
    Ok(Json(json!({ "received": true })))
}

/// Commerce backend topics.
#[instrument(skip_all)]
pub async fn commerce(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let commerce_headers = CommerceHeaders {
        topic: header(&headers, TOPIC_HEADER),
        signature: header(&headers, COMMERCE_SIGNATURE_HEADER),
        delivery_id: header(&headers, DELIVERY_ID_HEADER),
    };
    state
        .webhooks()
        .handle_commerce(commerce_headers, &body, Utc::now())
        .await?;
    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::routes::test_util::send;
    use crate::signature::sign_payment;
    use crate::testing::{Harness, PAYMENT_WEBHOOK_SECRET, line_item, paid_session};

    fn completed(session_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_route",
            "type": "checkout.session.completed",
            "created": 1,
            "livemode": false,
            "data": {"object": {"id": session_id}}
        }))
        .unwrap()
    }

    fn payment_request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::post("/api/webhooks/payments");
        if let Some(signature) = signature {
            builder = builder.header(PAYMENT_SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn sign(body: &[u8]) -> String {
        sign_payment(
            &SecretString::from(PAYMENT_WEBHOOK_SECRET),
            body,
            Utc::now().timestamp(),
        )
    }

    #[tokio::test]
    async fn test_signed_completion_creates_order() {
        let harness = Harness::new();
        harness.payments.serve(
            paid_session("cs_r", &[]),
            vec![line_item("a", 1, &[("product_id", "3")])],
        );
        let body = completed("cs_r");
        let signature = sign(&body);

        let (status, json) = send(harness.router(), payment_request(body, Some(signature))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["received"], true);
        assert_eq!(harness.commerce.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_failures() {
        let harness = Harness::new();
        let body = completed("cs_r");

        let (status, _) = send(harness.router(), payment_request(body.clone(), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            harness.router(),
            payment_request(body.clone(), Some("garbage".to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let stale = sign_payment(
            &SecretString::from(PAYMENT_WEBHOOK_SECRET),
            &body,
            Utc::now().timestamp() - 3600,
        );
        let (status, _) = send(harness.router(), payment_request(body, Some(stale))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(harness.payments.retrieved_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500() {
        let harness = Harness::new();
        harness.payments.set_failing(true);
        let body = completed("cs_r");
        let signature = sign(&body);

        let (status, _) = send(harness.router(), payment_request(body, Some(signature))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_commerce_product_update_unsigned() {
        let harness = Harness::new();
        let request = Request::post("/api/webhooks/commerce")
            .header(TOPIC_HEADER, "product.updated")
            .body(Body::from(r#"{"id": 9, "slug": "tee", "status": "publish"}"#))
            .unwrap();

        let (status, _) = send(harness.router(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(harness.revalidator.paths(), vec!["/product/tee", "/shop"]);
    }

    #[tokio::test]
    async fn test_commerce_missing_topic_and_ping() {
        let harness = Harness::new();

        let (status, _) = send(
            harness.router(),
            Request::post("/api/webhooks/commerce")
                .body(Body::from(r#"{"id": 9}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            harness.router(),
            Request::post("/api/webhooks/commerce")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("webhook_id=3"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
