//! HTTP middleware for the checkout server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! User identity is not middleware: handlers that need it take the
//! [`RequireUser`] or [`OptionalUser`] extractor.

pub mod request_id;
pub mod user;

pub use request_id::request_id_middleware;
pub use user::{OptionalUser, RequireUser, USER_ID_HEADER, UserRejection};
