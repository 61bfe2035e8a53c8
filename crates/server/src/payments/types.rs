//! Payment provider request and response types.

use std::collections::BTreeMap;

use checkout_core::{CurrencyCode, Email};
use serde::Deserialize;

// =============================================================================
// Session creation
// =============================================================================

/// One line of a checkout session about to be created.
///
/// Prices are inline (`price_data`), so nothing needs to exist in the
/// provider's catalog beforehand. Product identity travels in
/// `product_metadata` and comes back on the expanded line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRequest {
    pub name: String,
    pub quantity: u32,
    /// Unit price in minor units.
    pub unit_amount: i64,
    pub images: Vec<String>,
    pub product_metadata: BTreeMap<String, String>,
}

/// A checkout session about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    pub currency: CurrencyCode,
    pub line_items: Vec<LineItemRequest>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<Email>,
    /// Our user id, echoed back on the session.
    pub client_reference_id: Option<String>,
    /// Session metadata; every value must be a string.
    pub metadata: BTreeMap<String, String>,
}

impl CreateSessionRequest {
    /// Sum of `unit_amount × quantity` across all lines, in minor units.
    /// `None` if it does not fit in an `i64`.
    #[must_use]
    pub fn amount_total(&self) -> Option<i64> {
        self.line_items.iter().try_fold(0_i64, |acc, line| {
            line.unit_amount
                .checked_mul(i64::from(line.quantity))
                .and_then(|amount| acc.checked_add(amount))
        })
    }
}

/// The provider's answer to a session creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    /// Hosted payment page.
    pub url: Option<String>,
}

// =============================================================================
// Retrieved sessions
// =============================================================================

/// Whether the session's funds have been captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether an order may be created for this session.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::NoPaymentRequired)
    }
}

/// Customer details captured on the hosted page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// A checkout session as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// `open`, `complete` or `expired`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSession {
    /// The email the customer confirmed on the hosted page, falling back to
    /// the one we pre-filled.
    #[must_use]
    pub fn captured_email(&self) -> Option<Email> {
        self.customer_details
            .as_ref()
            .and_then(|details| Email::parse_lenient(details.email.as_deref()))
            .or_else(|| Email::parse_lenient(self.customer_email.as_deref()))
    }

    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// A product as embedded in an expanded price.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A product reference that may or may not have been expanded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpandableProduct {
    Expanded(Product),
    Id(String),
}

impl ExpandableProduct {
    /// Product metadata; `None` when the product was not expanded.
    #[must_use]
    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Expanded(product) => Some(&product.metadata),
            Self::Id(_) => None,
        }
    }
}

/// Price attached to a session line item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    pub product: ExpandableProduct,
}

/// A line item of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionLineItem {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub price: Option<Price>,
}

/// Paginated list envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

// =============================================================================
// Webhook events
// =============================================================================

/// A payment provider event envelope.
///
/// Only routing fields are trusted; money and order data are always
/// re-fetched from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: bool,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl PaymentEvent {
    /// Id of the event's subject (`cs_...`, `pi_...`).
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(serde_json::Value::as_str)
    }

    /// Failure message carried by a failed payment intent.
    #[must_use]
    pub fn last_payment_error(&self) -> Option<&str> {
        self.data
            .object
            .get("last_payment_error")
            .and_then(|e| e.get("message"))
            .and_then(serde_json::Value::as_str)
    }
}
