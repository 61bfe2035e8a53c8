//! Checkout session route.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use tracing::instrument;

use super::bad_json;
use crate::error::Result;
use crate::middleware::OptionalUser;
use crate::services::{CheckoutRequest, CheckoutResponse};
use crate::state::AppState;

/// Create a hosted checkout session for the submitted cart.
#[instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    OptionalUser(user_id): OptionalUser,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>> {
    let Json(request) = payload.map_err(|e| bad_json(&e))?;
    let response = state
        .checkout()
        .create_session(&request, user_id.as_ref())
        .await?;
    Ok(Json(response))
}
