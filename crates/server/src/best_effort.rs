//! Outcome type for side operations whose failure must not fail the caller.
//!
//! Coupon pre-validation and cache revalidation run alongside the real work
//! of a request. Their failures are logged once, when the [`BestEffort`]
//! value is built. There is no conversion into `Result`, so a best-effort
//! failure cannot be propagated with `?`.

use std::fmt;

/// Result of a best-effort operation.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort<T> {
    /// The operation succeeded.
    Done(T),
    /// The operation failed and the failure has been logged.
    Failed {
        /// Short name of the operation, for logs and tests.
        operation: &'static str,
        /// Rendered error.
        reason: String,
    },
}

impl<T> BestEffort<T> {
    /// Wrap a fallible outcome, logging a warning on failure.
    pub fn from_result<E: fmt::Display>(operation: &'static str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(operation, error = %reason, "best-effort operation failed");
                Self::Failed { operation, reason }
            }
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The value, if the operation succeeded.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    /// The value, or `default` if the operation failed.
    pub fn unwrap_or(self, default: T) -> T {
        self.done().unwrap_or(default)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BestEffort<U> {
        match self {
            Self::Done(value) => BestEffort::Done(f(value)),
            Self::Failed { operation, reason } => BestEffort::Failed { operation, reason },
        }
    }
}
