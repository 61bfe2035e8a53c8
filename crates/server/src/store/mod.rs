//! Key/JSON-document store backing cart and wishlist sync.
//!
//! The store knows nothing about snapshots: it reads and overwrites whole
//! JSON documents by key. Two implementations exist:
//!
//! - [`PostgresStore`] - one `JSONB` row per key, upsert on write
//! - [`MemoryStore`] - process-local map for development and tests

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when reading or writing documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read/overwrite contract of the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the document stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace the document stored under `key`.
    async fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
