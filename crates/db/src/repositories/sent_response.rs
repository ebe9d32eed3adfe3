use chrono::Utc;
use sqlx::Row;

use skelly_core::domain::reaction::ResponseKey;
use skelly_core::reactor::{ResponseLedger, StoreError};

use super::{store_error, RepositoryError};
use crate::DbPool;

pub struct SqlResponseLedger {
    pool: DbPool,
}

impl SqlResponseLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ResponseLedger for SqlResponseLedger {
    async fn response_exists(&self, key: &ResponseKey) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM sent_response
             WHERE channel = ? AND discriminator = ? AND timestamp = ?",
        )
        .bind(&key.channel)
        .bind(&key.discriminator)
        .bind(key.timestamp.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| StoreError::from(RepositoryError::Decode(e.to_string())))?;
        Ok(count > 0)
    }

    async fn store_response(&self, key: &ResponseKey) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sent_response (channel, discriminator, timestamp, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&key.channel)
        .bind(&key.discriminator)
        .bind(key.timestamp.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn remove_response(&self, key: &ResponseKey) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM sent_response WHERE channel = ? AND discriminator = ? AND timestamp = ?",
        )
        .bind(&key.channel)
        .bind(&key.discriminator)
        .bind(key.timestamp.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}
