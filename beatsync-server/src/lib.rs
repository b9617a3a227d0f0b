//! beatsync-server library - collaborative queue and playback coordination
//!
//! One host and many listeners share a queue: listeners enqueue and vote, the
//! host (or auto-play) advances playback to the best-scored track, and every
//! client stays in sync through a server-sent event stream.

use axum::Router;
use beatsync_common::config::{PlaybackProviderKind, SnapshotBackend};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod hub;
pub mod playback;
pub mod selector;

pub use error::{Error, Result};

use cache::{CacheBackend, MemoryCache, SqliteCache};
use config::ServerConfig;
use engine::Engine;
use hub::BroadcastHub;
use playback::{HostCredentials, PlaybackProvider, ScriptedPlayback, SpotifyPlayback};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }

    /// Open the database and wire up cache, hub and playback client
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let db = beatsync_common::db::init_database(&config.database_path).await?;

        let cache: Arc<dyn CacheBackend> = match config.snapshot_backend {
            SnapshotBackend::Memory => Arc::new(MemoryCache::new()),
            SnapshotBackend::Sqlite => Arc::new(SqliteCache::new(db.clone())),
        };

        let credentials = HostCredentials::new();
        let playback: Arc<dyn PlaybackProvider> = match config.playback_provider {
            PlaybackProviderKind::Spotify => Arc::new(
                SpotifyPlayback::new(
                    config.playback_api_base.clone(),
                    credentials.clone(),
                    config.engine.playback_timeout,
                )
                .map_err(|e| Error::Config(format!("playback client: {}", e)))?,
            ),
            PlaybackProviderKind::Offline => Arc::new(ScriptedPlayback::new()),
        };

        info!(
            "Cache backend: {}, playback provider: {}",
            cache.name(),
            playback.name()
        );

        let engine = Engine::new(
            db,
            BroadcastHub::new(config.event_capacity),
            cache,
            playback,
            credentials,
            config.engine.clone(),
        );

        Ok(Self::new(Arc::new(engine)))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::health_routes())
        .merge(api::session::session_routes())
        .merge(api::queue::queue_routes())
        .merge(api::playback::playback_routes())
        .merge(api::chat::chat_routes())
        .merge(api::sse::event_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
