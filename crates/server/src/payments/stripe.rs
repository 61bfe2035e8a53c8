//! Stripe REST client.
//!
//! Stripe takes form-encoded requests with bracketed keys
//! (`line_items[0][price_data][unit_amount]=4599`) and returns JSON.
//!
//! # API Reference
//!
//! - Authentication: `Authorization: Bearer <secret key>`
//! - `POST /v1/checkout/sessions`
//! - `GET /v1/checkout/sessions/{id}`
//! - `GET /v1/checkout/sessions/{id}/line_items`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;
use url::Url;

use super::{
    CheckoutSession, CreateSessionRequest, CreatedSession, ErrorResponse, ListResponse,
    PaymentError, PaymentProvider, SessionLineItem,
};
use crate::config::StripeConfig;

/// Page size for line item listing (provider maximum).
const LINE_ITEM_PAGE_SIZE: &str = "100";

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: Url,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the API base is not a valid URL, the key is not a
    /// valid header value, or the HTTP client fails to build.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.secret_key.expose_secret()))
                .map_err(|e| PaymentError::Parse(format!("Invalid API key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let api_base = Url::parse(&config.api_base)
            .map_err(|e| PaymentError::Parse(format!("Invalid API base: {e}")))?;

        Ok(Self {
            inner: Arc::new(StripeClientInner { client, api_base }),
        })
    }

    /// Build `{api_base}/v1/{segments...}`, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        endpoint(&self.inner.api_base, segments)
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| PaymentError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the Stripe API.
    async fn parse_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return PaymentError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return PaymentError::Unauthorized;
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ErrorResponse>(&body).map_or(body, |envelope| {
            let kind = envelope.error.kind.unwrap_or_else(|| "api_error".to_string());
            let message = envelope.error.message.unwrap_or_default();
            format!("{kind}: {message}")
        });

        if status == 404 {
            return PaymentError::NotFound(message);
        }

        PaymentError::Api { status, message }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, PaymentError> {
        let url = self.endpoint(&["checkout", "sessions"])?;
        let response = self
            .inner
            .client
            .post(url)
            .form(&session_form(request))
            .send()
            .await?;
        let session: CreatedSession = self.handle_response(response).await?;
        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        let url = self.endpoint(&["checkout", "sessions", session_id])?;
        let response = self.inner.client.get(url).send().await?;
        self.handle_response(response).await
    }

    #[instrument(skip(self))]
    async fn list_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionLineItem>, PaymentError> {
        let url = self.endpoint(&["checkout", "sessions", session_id, "line_items"])?;
        let mut items: Vec<SessionLineItem> = Vec::new();

        loop {
            let mut query = vec![
                ("limit", LINE_ITEM_PAGE_SIZE.to_string()),
                ("expand[]", "data.price.product".to_string()),
            ];
            if let Some(last) = items.last() {
                query.push(("starting_after", last.id.clone()));
            }

            let response = self
                .inner
                .client
                .get(url.clone())
                .query(&query)
                .send()
                .await?;
            let page: ListResponse<SessionLineItem> = self.handle_response(response).await?;
            let has_more = page.has_more && !page.data.is_empty();
            items.extend(page.data);
            if !has_more {
                break;
            }
        }

        tracing::debug!(count = items.len(), "fetched session line items");
        Ok(items)
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base.as_str())
            .finish_non_exhaustive()
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, PaymentError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| PaymentError::Parse("API base cannot be a base URL".to_string()))?
        .pop_if_empty()
        .push("v1")
        .extend(segments);
    Ok(url)
}

/// Flatten a session request into Stripe's bracketed form encoding.
fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.to_string()));
    }
    if let Some(reference) = &request.client_reference_id {
        form.push(("client_reference_id".to_string(), reference.clone()));
    }
    for (key, value) in &request.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    let currency = request.currency.as_str();
    for (i, line) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        for (j, image) in line.images.iter().enumerate() {
            form.push((
                format!("{prefix}[price_data][product_data][images][{j}]"),
                image.clone(),
            ));
        }
        for (key, value) in &line.product_metadata {
            form.push((
                format!("{prefix}[price_data][product_data][metadata][{key}]"),
                value.clone(),
            ));
        }
    }

    form
}
