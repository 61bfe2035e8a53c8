//! Webhook signature verification.
//!
//! Both webhook sources sign the raw request body with HMAC-SHA256:
//!
//! - Payment provider: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`
//!   over `"{t}.{body}"`, with a 300 second replay window.
//! - Commerce backend: `X-WC-Webhook-Signature: base64(hmac(body))`.
//!
//! Verification always runs on the exact bytes received, before anything
//! parses the body. A path with no configured secret runs in relaxed mode:
//! deliveries are accepted as [`Verification::Skipped`] and a warning is
//! logged every time.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payment provider signature.
pub const PAYMENT_SIGNATURE_HEADER: &str = "stripe-signature";

/// Header carrying the commerce backend signature.
pub const COMMERCE_SIGNATURE_HEADER: &str = "x-wc-webhook-signature";

/// Maximum age (either direction) of a signed payment timestamp.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// A secret is configured but the request carries no signature.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature header could not be parsed.
    #[error("malformed signature header: {0}")]
    MalformedSignature(&'static str),

    /// The signature does not match, or the signed timestamp is stale.
    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),
}

/// How a delivery got past verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature matched.
    Verified,
    /// No secret is configured; the delivery was not checked.
    Skipped,
}

/// Signing scheme of a webhook source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `t=..,v1=..` hex HMAC over `"{t}.{body}"`.
    Payment,
    /// Base64 HMAC over the body.
    Commerce,
}

impl Scheme {
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Payment => PAYMENT_SIGNATURE_HEADER,
            Self::Commerce => COMMERCE_SIGNATURE_HEADER,
        }
    }
}

/// Verifier for one webhook source.
#[derive(Clone)]
pub struct WebhookVerifier {
    scheme: Scheme,
    secret: Option<SecretString>,
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(scheme: Scheme, secret: Option<SecretString>) -> Self {
        Self { scheme, secret }
    }

    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Verify a delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if a secret is configured and the
    /// signature is missing, malformed, wrong, or (payment scheme) outside
    /// the replay window.
    pub fn verify(
        &self,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Verification, SignatureError> {
        let Some(secret) = &self.secret else {
            tracing::warn!(
                scheme = ?self.scheme,
                "no webhook secret configured, accepting unverified delivery"
            );
            return Ok(Verification::Skipped);
        };

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::MissingSignature)?;

        match self.scheme {
            Scheme::Payment => verify_payment(secret, signature, body, now)?,
            Scheme::Commerce => verify_commerce(secret, signature, body)?,
        }
        Ok(Verification::Verified)
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("scheme", &self.scheme)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Parsed `t=..,v1=..` header.
#[derive(Debug, PartialEq, Eq)]
struct PaymentHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_payment_header(header: &str) -> Result<PaymentHeader<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(SignatureError::MalformedSignature("expected key=value pairs"));
        };
        match key {
            "t" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| SignatureError::MalformedSignature("timestamp is not an integer"))?;
                timestamp = Some(parsed);
            }
            "v1" => signatures.push(value),
            // v0 and future schemes are ignored
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedSignature("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedSignature("missing v1 signature"));
    }
    Ok(PaymentHeader {
        timestamp,
        signatures,
    })
}

fn payment_mac(secret: &SecretString, timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(secret);
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

fn commerce_mac(secret: &SecretString, body: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(secret);
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

#[allow(clippy::expect_used)]
fn new_mac(secret: &SecretString) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC can take key of any size")
}

fn verify_payment(
    secret: &SecretString,
    header: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let header = parse_payment_header(header)?;

    let expected = hex::encode(payment_mac(secret, header.timestamp, body));
    let matched = header
        .signatures
        .iter()
        .any(|candidate| constant_time_compare(expected.as_bytes(), candidate.as_bytes()));
    if !matched {
        return Err(SignatureError::InvalidSignature("signature mismatch"));
    }

    if now.timestamp().abs_diff(header.timestamp) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
        tracing::warn!(
            signed_at = header.timestamp,
            now = now.timestamp(),
            "payment webhook timestamp outside tolerance"
        );
        return Err(SignatureError::InvalidSignature("timestamp outside tolerance"));
    }

    Ok(())
}

fn verify_commerce(secret: &SecretString, header: &str, body: &[u8]) -> Result<(), SignatureError> {
    let provided = BASE64
        .decode(header)
        .map_err(|_| SignatureError::MalformedSignature("signature is not base64"))?;
    let expected = commerce_mac(secret, body);
    if !constant_time_compare(&expected, &provided) {
        return Err(SignatureError::InvalidSignature("signature mismatch"));
    }
    Ok(())
}

/// Produce a payment-scheme signature header for `body`.
#[must_use]
pub fn sign_payment(secret: &SecretString, body: &[u8], timestamp: i64) -> String {
    format!(
        "t={timestamp},v1={}",
        hex::encode(payment_mac(secret, timestamp, body))
    )
}

/// Produce a commerce-scheme signature header for `body`.
#[must_use]
pub fn sign_commerce(secret: &SecretString, body: &[u8]) -> String {
    BASE64.encode(commerce_mac(secret, body))
}

/// Constant-time byte comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
