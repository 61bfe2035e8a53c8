//! Manual revalidation route.
//!
//! Lets an operator (or `checkout-cli revalidate`) invalidate a rendered
//! path. Guarded by the same shared secret the rendering layer checks.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::bad_json;
use crate::config::secret_matches;
use crate::error::{AppError, Result};
use crate::services::revalidation::validate_path;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RevalidateRequest {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
    /// Whether the rendering layer accepted the invalidation.
    pub revalidated: bool,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

/// Check the secret and path, then forward to the rendering layer.
#[instrument(skip_all)]
pub async fn revalidate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RevalidateRequest>, JsonRejection>,
) -> Result<Json<RevalidateResponse>> {
    let Json(request) = payload.map_err(|e| bad_json(&e))?;

    if !secret_matches(&state.config().revalidation.secret, &request.secret) {
        return Err(AppError::Unauthorized("Invalid secret".to_string()));
    }
    let path = validate_path(&request.path).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = state.revalidation().invalidate(path).await;
    Ok(Json(RevalidateResponse {
        revalidated: outcome.is_done(),
        path: path.to_string(),
        timestamp: Utc::now(),
    }))
}
