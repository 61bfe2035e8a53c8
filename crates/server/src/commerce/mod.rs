//! Commerce backend integration.
//!
//! The commerce backend is the system of record for catalog, coupons and
//! orders. This service only reads coupons and creates orders, through the
//! [`CommerceBackend`] trait; [`CommerceClient`] talks to its REST API.

mod client;
mod types;

pub use client::CommerceClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when interacting with the commerce backend.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unauthorized (invalid consumer credentials).
    #[error("Unauthorized: invalid consumer credentials")]
    Unauthorized,
}

/// Commerce backend operations used by checkout and reconciliation.
#[async_trait]
pub trait CommerceBackend: Send + Sync {
    /// Look up a coupon by its code. `Ok(None)` when no coupon has that code.
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, CommerceError>;

    /// Create an order.
    ///
    /// `idempotency_key` is sent as the `Idempotency-Key` header; a retried
    /// request with the same key must not create a second order.
    async fn create_order(
        &self,
        order: &NewOrder,
        idempotency_key: &str,
    ) -> Result<CreatedOrder, CommerceError>;
}
