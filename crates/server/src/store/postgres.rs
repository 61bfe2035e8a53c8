//! `PostgreSQL` document store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::{DocumentStore, StoreError};

/// Documents stored in `sync_documents(key, body, updated_at)`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT body FROM sync_documents WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(body,)| body))
    }

    #[instrument(skip(self, document))]
    async fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO sync_documents (key, body, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET body = EXCLUDED.body, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(key)
        .bind(sqlx::types::Json(document))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
