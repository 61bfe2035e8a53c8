//! Cache invalidation signals to the rendering layer.
//!
//! The rendering layer exposes `POST {url}` accepting `{path, secret}` and
//! marks the cached page at `path` stale. Every call made from here is
//! best-effort: a failed invalidation means a page stays stale until its
//! own cache expires, which never justifies failing the webhook or request
//! that triggered it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::best_effort::BestEffort;
use crate::config::RevalidationConfig;

/// Errors that can occur when asking the rendering layer to revalidate.
#[derive(Debug, Error)]
pub enum RevalidationError {
    /// HTTP request failed (including timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The rendering layer answered with a non-success status.
    #[error("Rendering layer returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The path is empty or not absolute.
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    /// The endpoint URL could not be parsed.
    #[error("Invalid revalidation URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Something that can mark a rendered path stale.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidationError>;
}

/// Check that `path` is non-empty and absolute.
///
/// # Errors
///
/// Returns [`RevalidationError::InvalidPath`] otherwise.
pub fn validate_path(path: &str) -> Result<&str, RevalidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || !trimmed.starts_with('/') {
        return Err(RevalidationError::InvalidPath(path.to_string()));
    }
    Ok(trimmed)
}

// =============================================================================
// HTTP implementation
// =============================================================================

#[derive(Serialize)]
struct RevalidateBody<'a> {
    path: &'a str,
    secret: &'a str,
}

/// Revalidator posting to the rendering layer over HTTP.
#[derive(Clone)]
pub struct HttpRevalidator {
    inner: Arc<HttpRevalidatorInner>,
}

struct HttpRevalidatorInner {
    client: reqwest::Client,
    url: Url,
    secret: SecretString,
}

impl HttpRevalidator {
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client fails to
    /// build.
    pub fn new(config: &RevalidationConfig, timeout: Duration) -> Result<Self, RevalidationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpRevalidatorInner {
                client,
                url: Url::parse(&config.url)?,
                secret: config.secret.clone(),
            }),
        })
    }
}

#[async_trait]
impl Revalidator for HttpRevalidator {
    #[instrument(skip(self))]
    async fn revalidate(&self, path: &str) -> Result<(), RevalidationError> {
        let response = self
            .inner
            .client
            .post(self.inner.url.clone())
            .json(&RevalidateBody {
                path,
                secret: self.inner.secret.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(RevalidationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for HttpRevalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRevalidator")
            .field("url", &self.inner.url.as_str())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Service
// =============================================================================

/// Maps catalog changes to the paths that need invalidating.
#[derive(Clone)]
pub struct RevalidationService {
    revalidator: Arc<dyn Revalidator>,
    listing_path: String,
    product_prefix: String,
}

impl RevalidationService {
    #[must_use]
    pub fn new(revalidator: Arc<dyn Revalidator>, config: &RevalidationConfig) -> Self {
        Self {
            revalidator,
            listing_path: config.listing_path.clone(),
            product_prefix: config.product_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Invalidate one path.
    pub async fn invalidate(&self, path: &str) -> BestEffort<()> {
        let result = match validate_path(path) {
            Ok(path) => self.revalidator.revalidate(path).await,
            Err(e) => Err(e),
        };
        if result.is_ok() {
            tracing::info!(path, "path revalidated");
        }
        BestEffort::from_result("revalidate", result)
    }

    /// A product was created or updated: its page (when the slug is known)
    /// and then the listing.
    pub async fn product_changed(&self, slug: Option<&str>) -> Vec<BestEffort<()>> {
        let mut outcomes = Vec::with_capacity(2);
        if let Some(path) = slug.and_then(|slug| self.product_path(slug)) {
            outcomes.push(self.invalidate(&path).await);
        }
        outcomes.push(self.invalidate(&self.listing_path).await);
        outcomes
    }

    /// A product was deleted. Deleted payloads carry only the id, so only
    /// the listing can be invalidated.
    pub async fn product_deleted(&self) -> BestEffort<()> {
        self.invalidate(&self.listing_path).await
    }

    /// `{product_prefix}/{slug}`, or `None` for a blank slug or one that
    /// would escape its segment.
    #[must_use]
    pub fn product_path(&self, slug: &str) -> Option<String> {
        let slug = slug.trim();
        if slug.is_empty() || slug.contains('/') {
            return None;
        }
        Some(format!("{}/{slug}", self.product_prefix))
    }

    #[must_use]
    pub fn listing_path(&self) -> &str {
        &self.listing_path
    }
}

impl std::fmt::Debug for RevalidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevalidationService")
            .field("listing_path", &self.listing_path)
            .field("product_prefix", &self.product_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeRevalidator, sample_config};

    fn service() -> (RevalidationService, Arc<FakeRevalidator>) {
        let fake = Arc::new(FakeRevalidator::new());
        let service = RevalidationService::new(fake.clone(), &sample_config().revalidation);
        (service, fake)
    }

    #[test]
    fn test_validate_path() {
        assert_eq!(validate_path("/shop").unwrap(), "/shop");
        assert_eq!(validate_path("  /product/tee ").unwrap(), "/product/tee");
        assert!(validate_path("").is_err());
        assert!(validate_path("   ").is_err());
        assert!(validate_path("shop").is_err());
    }

    #[test]
    fn test_product_path() {
        let (service, _) = service();
        assert_eq!(service.product_path("tee").as_deref(), Some("/product/tee"));
        assert_eq!(service.product_path(" "), None);
        assert_eq!(service.product_path("../admin/x"), None);
    }

    #[tokio::test]
    async fn test_product_changed_invalidates_page_then_listing() {
        let (service, fake) = service();
        let outcomes = service.product_changed(Some("tee")).await;
        assert!(outcomes.iter().all(BestEffort::is_done));
        assert_eq!(fake.paths(), vec!["/product/tee", "/shop"]);
    }

    #[tokio::test]
    async fn test_product_changed_without_slug_invalidates_listing() {
        let (service, fake) = service();
        let outcomes = service.product_changed(None).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(fake.paths(), vec!["/shop"]);
    }

    #[tokio::test]
    async fn test_failure_is_contained() {
        let (service, fake) = service();
        fake.set_failing(true);

        let outcome = service.product_deleted().await;
        assert!(matches!(
            outcome,
            BestEffort::Failed {
                operation: "revalidate",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_path_never_reaches_renderer() {
        let (service, fake) = service();
        assert!(!service.invalidate("relative").await.is_done());
        assert!(fake.paths().is_empty());
    }
}
