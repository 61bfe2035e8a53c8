//! Coupon lookup route.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Storefront view of a coupon.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResponse {
    pub code: String,
    pub discount_type: String,
    pub amount: Decimal,
    /// Not expired and not exhausted.
    pub valid: bool,
}

/// Look up a coupon on the commerce backend.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CouponResponse>> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("coupon code is required".to_string()));
    }

    let coupon = state
        .commerce()
        .find_coupon(code)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("coupon {code}")))?;

    Ok(Json(CouponResponse {
        valid: coupon.is_usable(),
        code: coupon.code,
        discount_type: coupon.discount_type,
        amount: coupon.amount,
    }))
}
