//! In-memory document store.
//!
//! Documents live only as long as the process and are not shared between
//! instances. Used when no database is configured, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), document.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_put_overwrites_whole_document() {
        let store = MemoryStore::new();
        store.put("cart:u1", &json!({"items": [1, 2]})).await.unwrap();
        store.put("cart:u1", &json!({"items": []})).await.unwrap();

        assert_eq!(store.get("cart:u1").await.unwrap(), Some(json!({"items": []})));
        assert_eq!(store.len().await, 1);
        assert!(store.get("cart:u2").await.unwrap().is_none());
    }
}
