//! HTTP route handlers for the checkout server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (document store reachable)
//!
//! # Checkout
//! POST /api/checkout/session    - Create a hosted checkout session
//! GET  /api/coupons/{code}      - Look up a coupon
//!
//! # Webhooks (raw body, signature verified before parsing)
//! POST /api/webhooks/payments   - Payment provider events
//! POST /api/webhooks/commerce   - Commerce backend topics
//!
//! # Sync (requires x-user-id)
//! GET  /api/sync/cart           - Current cart snapshot
//! PUT  /api/sync/cart           - Replace cart snapshot
//! GET  /api/sync/wishlist       - Current wishlist snapshot
//! PUT  /api/sync/wishlist       - Replace wishlist snapshot
//!
//! # Rendering layer
//! POST /api/revalidate          - Invalidate a rendered path
//! ```

pub mod checkout;
pub mod coupons;
pub mod revalidate;
pub mod sync;
pub mod webhooks;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use checkout_core::{CartSnapshot, WishlistSnapshot};

use crate::error::AppError;
use crate::state::AppState;

/// Create the full API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/checkout/session", post(checkout::create_session))
        .route("/api/coupons/{code}", get(coupons::show))
        .route("/api/webhooks/payments", post(webhooks::payments))
        .route("/api/webhooks/commerce", post(webhooks::commerce))
        .route(
            "/api/sync/cart",
            get(sync::show::<CartSnapshot>).put(sync::replace::<CartSnapshot>),
        )
        .route(
            "/api/sync/wishlist",
            get(sync::show::<WishlistSnapshot>).put(sync::replace::<WishlistSnapshot>),
        )
        .route("/api/revalidate", post(revalidate::revalidate))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies document store connectivity before returning OK.
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "document store not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Malformed JSON bodies are client errors, whatever axum's own status
/// for the rejection would be.
fn bad_json(rejection: &JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}
