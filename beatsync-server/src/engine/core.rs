//! Engine state and construction

use crate::cache::{CacheBackend, SnapshotCache};
use crate::error::{Error, Result};
use crate::hub::BroadcastHub;
use crate::playback::{HostCredentials, PlaybackProvider, ProviderError};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Tunables for the coordination engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum spacing between accepted auto-play triggers
    pub autoplay_debounce: Duration,
    /// Bound on each external playback call
    pub playback_timeout: Duration,
    pub chat_history_limit: u32,
    pub chat_history_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autoplay_debounce: Duration::from_millis(2000),
            playback_timeout: Duration::from_millis(5000),
            chat_history_limit: 50,
            chat_history_ttl: Duration::from_secs(30),
        }
    }
}

/// Owns all coordination state: database, caches, broadcast hub, playback
/// client and the auto-play gates
pub struct Engine {
    pub(super) db: SqlitePool,
    pub(super) hub: BroadcastHub,
    pub(super) snapshot: SnapshotCache,
    pub(super) playback: Arc<dyn PlaybackProvider>,
    pub(super) credentials: HostCredentials,
    pub(super) config: EngineConfig,
    /// Single-flight gate for auto-play (acquired with try_lock only)
    pub(super) autoplay_flight: Mutex<()>,
    /// Held from commit through broadcast so events follow commit order
    pub(super) sequencer: Mutex<()>,
}

impl Engine {
    pub fn new(
        db: SqlitePool,
        hub: BroadcastHub,
        cache: Arc<dyn CacheBackend>,
        playback: Arc<dyn PlaybackProvider>,
        credentials: HostCredentials,
        config: EngineConfig,
    ) -> Self {
        Self {
            snapshot: SnapshotCache::new(db.clone(), cache),
            db,
            hub,
            playback,
            credentials,
            config,
            autoplay_flight: Mutex::new(()),
            sequencer: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn snapshot_cache(&self) -> &SnapshotCache {
        &self.snapshot
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn playback_provider(&self) -> &str {
        self.playback.name()
    }

    /// Run one external playback call under the configured timeout
    pub(super) async fn call_provider<F>(&self, action: &str, call: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), ProviderError>>,
    {
        match tokio::time::timeout(self.config.playback_timeout, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("{} {} failed: {}", self.playback.name(), action, e);
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    "{} {} timed out after {:?}",
                    self.playback.name(),
                    action,
                    self.config.playback_timeout
                );
                Err(Error::PlaybackFailed(format!(
                    "{} timed out after {} ms",
                    action,
                    self.config.playback_timeout.as_millis()
                )))
            }
        }
    }
}
