//! Commerce backend REST client.
//!
//! # API Reference
//!
//! - Base URL: `{site}/wp-json/wc/v3`
//! - Authentication: HTTP basic auth with consumer key / consumer secret
//! - `GET /coupons?code=<code>` returns a (possibly empty) array
//! - `POST /orders` creates an order

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use super::{CommerceBackend, CommerceError, Coupon, CreatedOrder, ErrorResponse, NewOrder};
use crate::config::CommerceConfig;

/// Path from the site URL to the REST root.
const API_ROOT: &[&str] = &["wp-json", "wc", "v3"];

/// Header carrying the order idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Commerce backend API client.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    api_root: Url,
    consumer_key: String,
    consumer_secret: SecretString,
}

impl CommerceClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns error if the site URL is invalid or the HTTP client fails to
    /// build.
    pub fn new(config: &CommerceConfig, timeout: Duration) -> Result<Self, CommerceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let site = Url::parse(&config.base_url)
            .map_err(|e| CommerceError::Parse(format!("Invalid base URL: {e}")))?;
        let api_root = join(&site, API_ROOT)?;

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                api_root,
                consumer_key: config.consumer_key.clone(),
                consumer_secret: config.consumer_secret.clone(),
            }),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CommerceError> {
        join(&self.inner.api_root, segments)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.inner.client.request(method, url).basic_auth(
            &self.inner.consumer_key,
            Some(self.inner.consumer_secret.expose_secret()),
        )
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CommerceError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| CommerceError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the commerce API.
    async fn parse_error(&self, response: reqwest::Response) -> CommerceError {
        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return CommerceError::Unauthorized;
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ErrorResponse>(&body).map_or(body, |envelope| {
            format!(
                "{}: {}",
                envelope.code.unwrap_or_else(|| "error".to_string()),
                envelope.message.unwrap_or_default()
            )
        });

        if status == 404 {
            return CommerceError::NotFound(message);
        }

        CommerceError::Api { status, message }
    }
}

#[async_trait]
impl CommerceBackend for CommerceClient {
    #[instrument(skip(self))]
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, CommerceError> {
        let url = self.endpoint(&["coupons"])?;
        let response = self
            .request(reqwest::Method::GET, url)
            .query(&[("code", code)])
            .send()
            .await?;
        let coupons: Vec<Coupon> = self.handle_response(response).await?;

        // The backend matches codes case-insensitively; keep an exact match
        // if there is one.
        let wanted = code.to_lowercase();
        Ok(coupons
            .into_iter()
            .find(|coupon| coupon.code.to_lowercase() == wanted))
    }

    #[instrument(skip(self, order), fields(lines = order.line_items.len()))]
    async fn create_order(
        &self,
        order: &NewOrder,
        idempotency_key: &str,
    ) -> Result<CreatedOrder, CommerceError> {
        let url = self.endpoint(&["orders"])?;
        let response = self
            .request(reqwest::Method::POST, url)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(order)
            .send()
            .await?;
        let created: CreatedOrder = self.handle_response(response).await?;
        tracing::info!(order_id = %created.id, "commerce order created");
        Ok(created)
    }
}

impl std::fmt::Debug for CommerceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceClient")
            .field("api_root", &self.inner.api_root.as_str())
            .field("consumer_key", &self.inner.consumer_key)
            .finish_non_exhaustive()
    }
}

fn join(base: &Url, segments: &[&str]) -> Result<Url, CommerceError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| CommerceError::Parse("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
