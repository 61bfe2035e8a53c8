//! Cart and wishlist snapshots for cross-device sync.
//!
//! A snapshot is the whole state of one user's cart or wishlist at a point in
//! time. Snapshots are replaced wholesale on every write; there is no
//! line-level merge and no history. Derived fields (`count`, `total`) are
//! always recomputed from `items`, never trusted from the client.

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, UserId, VariationId};

/// Which kind of snapshot a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Cart,
    Wishlist,
}

impl SnapshotKind {
    /// Document key prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }

    /// Document key for one user's snapshot (`kind:userId`).
    #[must_use]
    pub fn document_key(self, user_id: &UserId) -> String {
        format!("{}:{user_id}", self.as_str())
    }
}

/// Errors building a snapshot from its items.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("cart total out of range")]
    TotalOutOfRange,
}

/// Common behaviour of cart and wishlist snapshots.
pub trait Snapshot: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Element type of `items`.
    type Item: DeserializeOwned + Send;

    /// Document kind.
    const KIND: SnapshotKind;

    /// Build a snapshot from its items, computing derived fields.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if a derived field cannot be represented.
    fn from_items(items: Vec<Self::Item>, updated_at: DateTime<Utc>) -> Result<Self, SnapshotError>;

    /// The canonical empty snapshot.
    fn empty(now: DateTime<Utc>) -> Self;

    /// When the snapshot was last written.
    fn updated_at(&self) -> DateTime<Utc>;
}

// =============================================================================
// Cart
// =============================================================================

/// One line of a synced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Commerce backend product.
    pub product_id: ProductId,
    /// Selected variation, if the product has variations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<VariationId>,
    /// Quantity; zero is rejected at deserialization.
    pub quantity: NonZeroU32,
    /// Unit price in the store currency's standard unit.
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Opaque storefront data (selected options, bundle info, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CartLine {
    /// `unit_price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity.get()))
    }
}

/// A user's cart as last written by any of their devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<CartLine>,
    /// Sum of quantities.
    pub count: u64,
    /// Sum of line totals.
    pub total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot for CartSnapshot {
    type Item = CartLine;

    const KIND: SnapshotKind = SnapshotKind::Cart;

    fn from_items(items: Vec<CartLine>, updated_at: DateTime<Utc>) -> Result<Self, SnapshotError> {
        let count = items.iter().map(|l| u64::from(l.quantity.get())).sum();
        let total = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))
            .ok_or(SnapshotError::TotalOutOfRange)?;
        Ok(Self {
            items,
            count,
            total,
            updated_at,
        })
    }

    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            total: Decimal::ZERO,
            updated_at: now,
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// One saved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<VariationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A user's wishlist: a set of product references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistSnapshot {
    pub items: Vec<WishlistItem>,
    pub count: u64,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot for WishlistSnapshot {
    type Item = WishlistItem;

    const KIND: SnapshotKind = SnapshotKind::Wishlist;

    /// Duplicate product references collapse to their first occurrence.
    fn from_items(
        items: Vec<WishlistItem>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::new();
        let items: Vec<WishlistItem> = items
            .into_iter()
            .filter(|item| seen.insert((item.product_id, item.variation_id)))
            .collect();
        Ok(Self {
            count: items.len() as u64,
            items,
            updated_at,
        })
    }

    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            updated_at: now,
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
