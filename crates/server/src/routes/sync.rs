//! Cart and wishlist sync routes.
//!
//! The same two handlers serve both snapshot kinds; the route picks the
//! snapshot type.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use checkout_core::Snapshot;
use chrono::Utc;
use tracing::instrument;

use super::bad_json;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Current snapshot, or the empty one.
#[instrument(skip_all, fields(kind = S::KIND.as_str()))]
pub async fn show<S: Snapshot>(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<S>> {
    let snapshot = state.sync().get::<S>(&user_id, Utc::now()).await?;
    Ok(Json(snapshot))
}

/// Replace the snapshot wholesale; responds with what was stored.
#[instrument(skip_all, fields(kind = S::KIND.as_str()))]
pub async fn replace<S: Snapshot>(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    payload: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<S>> {
    let Json(body) = payload.map_err(|e| bad_json(&e))?;
    let snapshot = state.sync().put::<S>(&user_id, body, Utc::now()).await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use crate::middleware::USER_ID_HEADER;
    use crate::routes::test_util::{json_request, send};
    use crate::testing::Harness;

    fn as_user(mut request: Request<Body>, user: &str) -> Request<Body> {
        request
            .headers_mut()
            .insert(USER_ID_HEADER, user.parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_put_then_get_cart() {
        let harness = Harness::new();
        let body = json!({"items": [{"productId": 1, "quantity": 2, "unitPrice": "45.99"}]});

        let (status, stored) = send(
            harness.router(),
            as_user(json_request("PUT", "/api/sync/cart", &body), "u-1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["count"], 2);
        assert_eq!(stored["total"], "91.98");

        let (status, fetched) = send(
            harness.router(),
            as_user(
                Request::get("/api/sync/cart").body(Body::empty()).unwrap(),
                "u-1",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn test_wishlist_defaults_to_empty() {
        let harness = Harness::new();
        let (status, body) = send(
            harness.router(),
            as_user(
                Request::get("/api/sync/wishlist").body(Body::empty()).unwrap(),
                "u-2",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], json!([]));
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_requires_user() {
        let harness = Harness::new();
        let (status, _) = send(
            harness.router(),
            Request::get("/api/sync/cart").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_is_400() {
        let harness = Harness::new();
        let (status, _) = send(
            harness.router(),
            as_user(
                json_request("PUT", "/api/sync/cart", &json!({"items": "nope"})),
                "u-1",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(harness.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_out_of_range_total_is_400() {
        let harness = Harness::new();
        let body = json!({"items": [
            {"productId": 1, "quantity": 2, "unitPrice": "79228162514264337593543950335"}
        ]});

        let (status, response) = send(
            harness.router(),
            as_user(json_request("PUT", "/api/sync/cart", &body), "u-1"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "Bad request: cart total out of range");
        assert!(harness.store.is_empty().await);
    }
}
