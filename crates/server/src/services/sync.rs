//! Cross-device cart and wishlist sync.
//!
//! Each user has at most one cart document and one wishlist document,
//! keyed `kind:userId`. Writes replace the whole document (last writer
//! wins); reads never fail with "not found" and fall back to the empty
//! snapshot instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use checkout_core::{Snapshot, UserId};
use thiserror::Error;
use tracing::instrument;

use crate::store::{DocumentStore, StoreError};

/// Errors that can occur when syncing snapshots.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The submitted body is not a valid snapshot.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The snapshot could not be encoded for storage.
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reads and writes per-user snapshots.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn DocumentStore>,
}

impl SyncService {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The user's stored snapshot, or the empty snapshot stamped `now`.
    ///
    /// A stored document that no longer parses is logged and treated as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the store cannot be read.
    #[instrument(skip(self), fields(kind = S::KIND.as_str()))]
    pub async fn get<S: Snapshot>(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<S, SyncError> {
        let key = S::KIND.document_key(user_id);
        let Some(document) = self.store.get(&key).await? else {
            return Ok(S::empty(now));
        };

        match serde_json::from_value::<S>(document) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored snapshot is unreadable, serving empty");
                Ok(S::empty(now))
            }
        }
    }

    /// Replace the user's snapshot with `body`.
    ///
    /// Only `items` is read from the body; `updatedAt` is stamped with
    /// `now` and derived fields are recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSnapshot`] if `items` is missing, is not
    /// an array, or holds an item that fails to parse, and
    /// [`SyncError::Store`] if the write fails.
    #[instrument(skip(self, body), fields(kind = S::KIND.as_str()))]
    pub async fn put<S: Snapshot>(
        &self,
        user_id: &UserId,
        body: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<S, SyncError> {
        let snapshot = parse_snapshot::<S>(body, now)?;
        let document = serde_json::to_value(&snapshot)?;

        let key = S::KIND.document_key(user_id);
        self.store.put(&key, &document).await?;

        tracing::debug!(key, "snapshot replaced");
        Ok(snapshot)
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService").finish_non_exhaustive()
    }
}

fn parse_snapshot<S: Snapshot>(body: serde_json::Value, now: DateTime<Utc>) -> Result<S, SyncError> {
    let serde_json::Value::Object(mut fields) = body else {
        return Err(SyncError::InvalidSnapshot(
            "body must be a JSON object".to_string(),
        ));
    };

    let items = match fields.remove("items") {
        Some(items @ serde_json::Value::Array(_)) => items,
        Some(_) => {
            return Err(SyncError::InvalidSnapshot(
                "items must be an array".to_string(),
            ));
        }
        None => return Err(SyncError::InvalidSnapshot("items is required".to_string())),
    };

    let items: Vec<S::Item> =
        serde_json::from_value(items).map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;

    S::from_items(items, now).map_err(|e| SyncError::InvalidSnapshot(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use checkout_core::{CartSnapshot, WishlistSnapshot};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (SyncService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SyncService::new(store.clone()), store)
    }

    fn user() -> UserId {
        UserId::parse("user-1").unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn cart_body() -> serde_json::Value {
        json!({
            "items": [
                {"productId": 1, "quantity": 2, "unitPrice": 45.99},
                {"productId": 2, "variationId": 20, "quantity": 1, "unitPrice": "5.00"}
            ],
            "count": 999,
            "total": "0.01"
        })
    }

    #[tokio::test]
    async fn test_get_without_document_is_empty_now() {
        let (service, _) = service();
        let now = at(1_700_000_000);

        let cart: CartSnapshot = service.get(&user(), now).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.count, 0);
        assert_eq!(cart.total, Decimal::ZERO);
        assert_eq!(cart.updated_at, now);
    }

    #[tokio::test]
    async fn test_put_recomputes_derived_fields() {
        let (service, _) = service();
        let cart: CartSnapshot = service.put(&user(), cart_body(), at(10)).await.unwrap();

        assert_eq!(cart.count, 3);
        assert_eq!(cart.total, Decimal::new(9698, 2));
        assert_eq!(cart.updated_at, at(10));
    }

    #[tokio::test]
    async fn test_put_twice_equals_put_once() {
        let (service, store) = service();

        service
            .put::<CartSnapshot>(&user(), cart_body(), at(10))
            .await
            .unwrap();
        let once: CartSnapshot = service.get(&user(), at(11)).await.unwrap();

        service
            .put::<CartSnapshot>(&user(), cart_body(), at(20))
            .await
            .unwrap();
        let twice: CartSnapshot = service.get(&user(), at(21)).await.unwrap();

        assert_eq!(once.items, twice.items);
        assert_eq!(once.count, twice.count);
        assert_eq!(once.total, twice.total);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let (service, _) = service();
        service
            .put::<CartSnapshot>(&user(), cart_body(), at(10))
            .await
            .unwrap();
        service
            .put::<CartSnapshot>(&user(), json!({"items": []}), at(20))
            .await
            .unwrap();

        let cart: CartSnapshot = service.get(&user(), at(30)).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.updated_at, at(20));
    }

    #[tokio::test]
    async fn test_put_rejects_bad_bodies() {
        let (service, store) = service();
        for body in [
            json!([]),
            json!({}),
            json!({"items": {}}),
            json!({"items": [{"productId": 1, "quantity": 0, "unitPrice": 1}]}),
        ] {
            let err = service
                .put::<CartSnapshot>(&user(), body, at(1))
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::InvalidSnapshot(_)));
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_rejects_unrepresentable_total() {
        let (service, store) = service();
        let body = json!({"items": [
            {"productId": 1, "quantity": 2, "unitPrice": "79228162514264337593543950335"}
        ]});

        let err = service
            .put::<CartSnapshot>(&user(), body, at(1))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::InvalidSnapshot(msg) if msg == "cart total out of range"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cart_and_wishlist_are_separate_documents() {
        let (service, store) = service();
        service
            .put::<CartSnapshot>(&user(), cart_body(), at(1))
            .await
            .unwrap();
        let wishlist: WishlistSnapshot = service.get(&user(), at(2)).await.unwrap();
        assert!(wishlist.items.is_empty());

        service
            .put::<WishlistSnapshot>(
                &user(),
                json!({"items": [{"productId": 5}, {"productId": 5}]}),
                at(3),
            )
            .await
            .unwrap();
        let wishlist: WishlistSnapshot = service.get(&user(), at(4)).await.unwrap();
        assert_eq!(wishlist.count, 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_unreadable_document_served_empty() {
        let (service, store) = service();
        store
            .put("cart:user-1", &json!({"items": "corrupt"}))
            .await
            .unwrap();

        let cart: CartSnapshot = service.get(&user(), at(5)).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.updated_at, at(5));
    }
}
