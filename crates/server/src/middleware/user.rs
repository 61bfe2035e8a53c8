//! User identity extractors.
//!
//! Sessions are issued by the storefront, not by this service. The
//! storefront's server forwards the authenticated user's id in the
//! `x-user-id` header; this service only parses it.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn handler(RequireUser(user_id): RequireUser) -> impl IntoResponse {
//!     format!("Hello, {user_id}!")
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use checkout_core::{UserId, UserIdError};
use serde_json::json;

use crate::error::set_sentry_user;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated user.
pub struct RequireUser(pub UserId);

/// Error returned when a user is required but none (or garbage) was sent.
#[derive(Debug)]
pub enum UserRejection {
    Missing,
    Invalid(UserIdError),
}

impl IntoResponse for UserRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Missing => "Authentication required".to_string(),
            Self::Invalid(e) => format!("Invalid user id: {e}"),
        };
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
    }
}

fn user_from_parts(parts: &Parts) -> Result<UserId, UserRejection> {
    let raw = parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or(UserRejection::Missing)?;

    let user_id = UserId::parse(raw).map_err(UserRejection::Invalid)?;
    set_sentry_user(&user_id);
    Ok(user_id)
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = UserRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_parts(parts).map(Self)
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireUser`, this does not reject the request. A malformed id
/// is treated as anonymous.
pub struct OptionalUser(pub Option<UserId>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(user_from_parts(parts).ok()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, extract::Request, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route(
                "/required",
                get(|RequireUser(user): RequireUser| async move { user.to_string() }),
            )
            .route(
                "/optional",
                get(|OptionalUser(user): OptionalUser| async move {
                    user.map_or_else(|| "guest".to_string(), |u| u.to_string())
                }),
            )
    }

    async fn call(uri: &str, user: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(uri);
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user);
        }
        let response = app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_require_user() {
        assert_eq!(
            call("/required", Some("u-1")).await,
            (StatusCode::OK, "u-1".to_string())
        );
        assert_eq!(call("/required", None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(call("/required", Some("  ")).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            call("/required", Some("cart:u-1")).await.0,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_optional_user() {
        assert_eq!(call("/optional", Some("u-1")).await.1, "u-1");
        assert_eq!(call("/optional", None).await.1, "guest");
        assert_eq!(call("/optional", Some("bad:id")).await.1, "guest");
    }
}
