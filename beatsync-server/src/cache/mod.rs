//! Cache tier
//!
//! [`CacheBackend`] is a small key/value interface with one implementation per
//! storage backend. Callers store JSON strings. [`SnapshotCache`] layers the
//! queue snapshot and now-playing views on top and falls back to the database
//! whenever the backend fails.

mod memory;
mod snapshot;
mod sqlite;

pub use memory::MemoryCache;
pub use snapshot::{SnapshotCache, Staged, NOW_PLAYING_KEY, SNAPSHOT_KEY};
pub use sqlite::SqliteCache;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value cache storage
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a live value; expired entries read as None
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
