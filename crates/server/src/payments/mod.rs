//! Payment provider integration.
//!
//! The service talks to the payment provider through the [`PaymentProvider`]
//! trait so that checkout and reconciliation can run against in-process
//! fakes in tests. [`StripeClient`] is the production implementation.
//!
//! # Operations
//!
//! - Create a hosted checkout session
//! - Re-fetch a session by id (payment status, metadata, customer email)
//! - List a session's line items with their products expanded

mod stripe;
mod types;

pub use stripe::StripeClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when interacting with the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the provider.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unauthorized (invalid API key).
    #[error("Unauthorized: invalid API key")]
    Unauthorized,
}

/// Payment provider operations used by checkout and reconciliation.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, PaymentError>;

    /// Fetch a checkout session by id.
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError>;

    /// Fetch every line item of a checkout session, products expanded.
    async fn list_line_items(&self, session_id: &str)
    -> Result<Vec<SessionLineItem>, PaymentError>;
}
