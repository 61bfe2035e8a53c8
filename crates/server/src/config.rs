//! Checkout server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHECKOUT_BASE_URL` - Public storefront URL (success/cancel redirects)
//! - `STRIPE_SECRET_KEY` - Payment provider secret API key
//! - `COMMERCE_BASE_URL` - Commerce backend site URL
//! - `COMMERCE_CONSUMER_KEY` - Commerce REST API consumer key
//! - `COMMERCE_CONSUMER_SECRET` - Commerce REST API consumer secret
//! - `REVALIDATE_URL` - Rendering layer revalidation endpoint
//! - `REVALIDATE_SECRET` - Shared secret for revalidation requests
//!
//! ## Optional
//! - `CHECKOUT_HOST` - Bind address (default: 127.0.0.1)
//! - `CHECKOUT_PORT` - Listen port (default: 3002)
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` document store; in-memory when unset
//! - `CHECKOUT_CURRENCY` - ISO 4217 code for checkout sessions (default: usd)
//! - `HTTP_TIMEOUT_SECS` - Timeout for every outbound request (default: 5)
//! - `STRIPE_WEBHOOK_SECRET` - Payment webhook signing secret (unverified when unset)
//! - `STRIPE_API_BASE` - Payment provider API base (default: `https://api.stripe.com`)
//! - `COMMERCE_WEBHOOK_SECRET` - Commerce webhook signing secret (unverified when unset)
//! - `REVALIDATE_LISTING_PATH` - Catalog listing path (default: /shop)
//! - `REVALIDATE_PRODUCT_PREFIX` - Product page prefix (default: /product)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use checkout_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Checkout server configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public storefront base URL, without trailing slash
    pub base_url: String,
    /// `PostgreSQL` document store URL; `None` selects the in-memory store
    pub database_url: Option<SecretString>,
    /// Currency for every checkout session
    pub currency: CurrencyCode,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    pub stripe: StripeConfig,
    pub commerce: CommerceConfig,
    pub revalidation: RevalidationConfig,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    /// `None` puts the payment webhook path in relaxed mode.
    pub webhook_secret: Option<SecretString>,
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Commerce backend REST configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CommerceConfig {
    /// Site URL; the REST root is `{base_url}/wp-json/wc/v3`.
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    /// `None` puts the commerce webhook path in relaxed mode.
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Rendering layer revalidation configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RevalidationConfig {
    pub url: String,
    /// Shared secret, used both inbound (`/api/revalidate`) and outbound.
    pub secret: SecretString,
    pub listing_path: String,
    pub product_prefix: String,
}

impl std::fmt::Debug for RevalidationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevalidationConfig")
            .field("url", &self.url)
            .field("secret", &"[REDACTED]")
            .field("listing_path", &self.listing_path)
            .field("product_prefix", &self.product_prefix)
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("CHECKOUT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("CHECKOUT_PORT", "3002")?;
        let base_url = trim_trailing_slash(get_required_env("CHECKOUT_BASE_URL")?);
        validate_url("CHECKOUT_BASE_URL", &base_url)?;
        let database_url = get_database_url("CHECKOUT_DATABASE_URL");
        let currency = parse_env_or_default::<CurrencyCode>("CHECKOUT_CURRENCY", "usd")?;
        let timeout_secs = parse_env_or_default::<u64>("HTTP_TIMEOUT_SECS", "5")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "HTTP_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_format = match get_optional_env("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            currency,
            http_timeout: Duration::from_secs(timeout_secs),
            stripe: StripeConfig::from_env()?,
            commerce: CommerceConfig::from_env()?,
            revalidation: RevalidationConfig::from_env()?,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_base = trim_trailing_slash(get_env_or_default(
            "STRIPE_API_BASE",
            "https://api.stripe.com",
        ));
        validate_url("STRIPE_API_BASE", &api_base)?;
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_optional_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            api_base,
        })
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = trim_trailing_slash(get_required_env("COMMERCE_BASE_URL")?);
        validate_url("COMMERCE_BASE_URL", &base_url)?;
        Ok(Self {
            base_url,
            consumer_key: get_required_env("COMMERCE_CONSUMER_KEY")?,
            consumer_secret: get_validated_secret("COMMERCE_CONSUMER_SECRET")?,
            webhook_secret: get_optional_validated_secret("COMMERCE_WEBHOOK_SECRET")?,
        })
    }
}

impl RevalidationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = get_required_env("REVALIDATE_URL")?;
        validate_url("REVALIDATE_URL", &url)?;
        Ok(Self {
            url,
            secret: get_validated_secret("REVALIDATE_SECRET")?,
            listing_path: get_env_or_default("REVALIDATE_LISTING_PATH", "/shop"),
            product_prefix: trim_trailing_slash(get_env_or_default(
                "REVALIDATE_PRODUCT_PREFIX",
                "/product",
            )),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to a default.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(())
}

fn trim_trailing_slash(mut value: String) -> String {
    while value.ends_with('/') {
        value.pop();
    }
    value
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Load and validate a secret that may be absent.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_secret_strength(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}

/// Whether a configured secret matches a presented one, in constant time.
#[must_use]
pub fn secret_matches(configured: &SecretString, presented: &str) -> bool {
    crate::signature::constant_time_compare(
        configured.expose_secret().as_bytes(),
        presented.as_bytes(),
    )
}
