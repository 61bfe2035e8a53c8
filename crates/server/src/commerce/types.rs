//! Commerce backend REST types (`/wp-json/wc/v3`).

use chrono::{NaiveDateTime, Utc};
use checkout_core::{Address, CustomerId, OrderId, ProductId, VariationId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A coupon as returned by `GET /coupons?code=`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    /// `percent`, `fixed_cart` or `fixed_product`.
    pub discount_type: String,
    pub amount: Decimal,
    #[serde(default)]
    pub date_expires_gmt: Option<NaiveDateTime>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
}

impl Coupon {
    /// Whether the coupon can still be applied.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        let expired = self
            .date_expires_gmt
            .is_some_and(|expires| expires <= Utc::now().naive_utc());
        let exhausted = self
            .usage_limit
            .is_some_and(|limit| self.usage_count >= limit);
        !expired && !exhausted
    }
}

/// Key/value metadata attached to orders and order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub key: String,
    pub value: String,
}

impl MetaData {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One line of an order to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<VariationId>,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub meta_data: Vec<MetaData>,
}

/// A coupon applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponLine {
    pub code: String,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub payment_method: String,
    pub payment_method_title: String,
    pub set_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<CustomerId>,
    pub billing: Address,
    pub shipping: Address,
    pub line_items: Vec<OrderLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coupon_lines: Vec<CouponLine>,
    pub meta_data: Vec<MetaData>,
}

/// The backend's answer to an order creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedOrder {
    pub id: OrderId,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Error envelope (`{"code": "...", "message": "..."}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Product payload of `product.*` webhooks.
///
/// Deleted products arrive with only an `id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductPayload {
    pub id: ProductId,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Order payload of `order.*` webhooks; only logged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderPayload {
    pub id: OrderId,
    #[serde(default)]
    pub status: Option<String>,
}
