use super::{CacheBackend, CacheError};
use async_trait::async_trait;
use beatsync_common::time::now_millis;
use sqlx::SqlitePool;
use std::time::Duration;

/// Cache stored in the `cache_entries` table
///
/// Shared by every server process that opens the same database file.
#[derive(Clone)]
pub struct SqliteCache {
    db: SqlitePool,
}

impl SqliteCache {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM cache_entries
            WHERE key = ? AND (expires_at_ms IS NULL OR expires_at_ms > ?)
            "#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.db)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at_ms = ttl.map(|ttl| now_millis() + ttl.as_millis() as i64);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at_ms) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at_ms = excluded.expires_at_ms
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at_ms)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
