//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Domain errors convert into `AppError` so that the status mapping lives in
//! one place.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::commerce::CommerceError;
use crate::payments::PaymentError;
use crate::services::{CheckoutError, ReconcileError, SyncError};
use crate::signature::SignatureError;
use crate::store::StoreError;
use crate::webhooks::WebhookError;

/// Application-level error type for the checkout server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payment provider operation failed.
    #[error("Payment provider error: {0}")]
    Payments(#[from] PaymentError),

    /// Commerce backend operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An upstream dependency failed on a read-only lookup.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials or signature.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Payments(e) => Self::Payments(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InvalidSnapshot(msg) => Self::BadRequest(msg),
            SyncError::Store(e) => Self::Store(e),
            SyncError::Encode(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::MissingSignature | SignatureError::MalformedSignature(_) => {
                Self::BadRequest(err.to_string())
            }
            SignatureError::InvalidSignature(_) => Self::Unauthorized(err.to_string()),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Signature(e) => e.into(),
            WebhookError::MalformedPayload(_) | WebhookError::MissingTopic => {
                Self::BadRequest(err.to_string())
            }
            WebhookError::Reconcile(ReconcileError::Payments(e)) => Self::Payments(e),
            WebhookError::Reconcile(ReconcileError::Commerce(e)) => Self::Commerce(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Payments(_)
                | Self::Commerce(_)
                | Self::Store(_)
                | Self::Upstream(_)
                | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Payments(_) | Self::Commerce(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payments(_) | Self::Commerce(_) | Self::Upstream(_) => {
                "External service error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the upstream user id is known to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
