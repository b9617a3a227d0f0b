//! Snapshot Cache
//!
//! Write-through cache of the queue snapshot (entries plus vote counts) and
//! of the now-playing row. Mutations stage the new views inside their own
//! transaction ([`SnapshotCache::stage_snapshot`]) and store them once it
//! commits, so nothing after a commit can fail. Each cached value carries the
//! `state_version` it was built from, and readers only accept a value whose
//! version is current, so a cached value can never be older than the latest
//! commit even when another process shares the database.
//!
//! The cache is never a correctness dependency: any backend error is logged
//! and the value is read from the database instead.

use super::{CacheBackend, CacheError};
use crate::db::{now_playing, queue, votes};
use crate::error::Result;
use beatsync_common::db::NowPlaying;
use beatsync_common::events::{QueueSnapshot, QueueSnapshotEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const SNAPSHOT_KEY: &str = "queue_snapshot";
pub const NOW_PLAYING_KEY: &str = "now_playing";

#[derive(Debug, Serialize, Deserialize)]
struct Versioned<T> {
    version: i64,
    value: T,
}

/// A view read inside a transaction, waiting to be stored after commit
#[derive(Debug, Clone)]
pub struct Staged<T> {
    pub version: i64,
    pub value: T,
}

pub struct SnapshotCache {
    db: SqlitePool,
    backend: Arc<dyn CacheBackend>,
    rebuild_lock: Mutex<()>,
}

impl SnapshotCache {
    pub fn new(db: SqlitePool, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            db,
            backend,
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Cached snapshot as stored, without a freshness check
    pub async fn get(&self) -> std::result::Result<Option<QueueSnapshot>, CacheError> {
        Ok(self
            .cached::<QueueSnapshot>(SNAPSHOT_KEY)
            .await?
            .map(|v| v.value))
    }

    /// Read the queue snapshot as seen by an open transaction
    pub async fn stage_snapshot(conn: &mut SqliteConnection) -> Result<Staged<QueueSnapshot>> {
        let version = state_version(&mut *conn).await?;
        let entries = queue::list(&mut *conn).await?;
        let counts = votes::counts_all(&mut *conn).await?;

        let snapshot = QueueSnapshot {
            entries: entries
                .into_iter()
                .map(|entry| {
                    let c = counts.get(&entry.track_uri).copied().unwrap_or_default();
                    QueueSnapshotEntry::new(entry, c)
                })
                .collect(),
        };

        Ok(Staged {
            version,
            value: snapshot,
        })
    }

    /// Read now-playing as seen by an open transaction
    pub async fn stage_now_playing(
        conn: &mut SqliteConnection,
    ) -> Result<Staged<Option<NowPlaying>>> {
        let version = state_version(&mut *conn).await?;
        let value = now_playing::get(&mut *conn).await?;
        Ok(Staged { version, value })
    }

    /// Store a staged snapshot. Backend failures are only logged.
    pub async fn store_snapshot(&self, staged: &Staged<QueueSnapshot>) {
        self.store(SNAPSHOT_KEY, staged.version, &staged.value).await;
        debug!(
            "Stored queue snapshot: {} entries (version {})",
            staged.value.len(),
            staged.version
        );
    }

    pub async fn store_now_playing(&self, staged: &Staged<Option<NowPlaying>>) {
        self.store(NOW_PLAYING_KEY, staged.version, &staged.value).await;
    }

    /// Recompute the snapshot from the database and store it
    pub async fn rebuild(&self) -> Result<QueueSnapshot> {
        let _guard = self.rebuild_lock.lock().await;

        let mut tx = self.db.begin().await?;
        let staged = Self::stage_snapshot(&mut tx).await?;
        tx.commit().await?;

        self.store_snapshot(&staged).await;
        Ok(staged.value)
    }

    /// Drop every cached view
    pub async fn invalidate(&self) {
        for key in [SNAPSHOT_KEY, NOW_PLAYING_KEY] {
            if let Err(e) = self.backend.delete(key).await {
                warn!("Failed to invalidate {} in {} cache: {}", key, self.backend.name(), e);
            }
        }
    }

    /// Snapshot for readers: the cached value when current, else a rebuild
    pub async fn current(&self) -> Result<QueueSnapshot> {
        if let Some(snapshot) = self.fresh::<QueueSnapshot>(SNAPSHOT_KEY).await? {
            return Ok(snapshot);
        }
        self.rebuild().await
    }

    /// Now-playing for readers: the cached value when current, else the table
    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        if let Some(value) = self.fresh::<Option<NowPlaying>>(NOW_PLAYING_KEY).await? {
            return Ok(value);
        }
        self.refresh_now_playing().await
    }

    /// Reload now-playing from the table and store it
    pub async fn refresh_now_playing(&self) -> Result<Option<NowPlaying>> {
        let mut tx = self.db.begin().await?;
        let staged = Self::stage_now_playing(&mut tx).await?;
        tx.commit().await?;

        self.store_now_playing(&staged).await;
        Ok(staged.value)
    }

    async fn cached<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> std::result::Result<Option<Versioned<T>>, CacheError> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Cached value whose version matches the database, if any
    async fn fresh<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let cached = match self.cached::<T>(key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("{} cache read failed for {}, using database: {}", self.backend.name(), key, e);
                return Ok(None);
            }
        };

        let Some(cached) = cached else {
            return Ok(None);
        };

        if cached.version == state_version(&self.db).await? {
            Ok(Some(cached.value))
        } else {
            Ok(None)
        }
    }

    async fn store<T: Serialize>(&self, key: &str, version: i64, value: &T) {
        let encoded = match serde_json::to_string(&Versioned { version, value }) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode {} for cache: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.set(key, encoded, None).await {
            warn!("{} cache write failed for {}: {}", self.backend.name(), key, e);
        }
    }
}

async fn state_version(db: impl SqliteExecutor<'_>) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("SELECT version FROM state_version WHERE id = 1")
        .fetch_one(db)
        .await?;
    Ok(version)
}
