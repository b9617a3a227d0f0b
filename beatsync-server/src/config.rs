//! beatsync-server configuration
//!
//! Command-line arguments (each with a `BEATSYNC_*` environment fallback)
//! override the TOML config file, which overrides compiled defaults.

use crate::engine::EngineConfig;
use beatsync_common::config::{
    CompiledDefaults, PlaybackProviderKind, RootFolderInitializer, RootFolderResolver,
    SnapshotBackend, TomlConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "beatsync-server", version, about = "BeatSync collaborative queue server")]
pub struct Args {
    /// Root folder holding the database
    #[arg(long, env = "BEATSYNC_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// Address to listen on (host:port)
    #[arg(long, env = "BEATSYNC_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Database file, relative to the root folder unless absolute
    #[arg(long, env = "BEATSYNC_DATABASE_FILE")]
    pub database_file: Option<String>,

    /// Minimum spacing between accepted auto-play triggers (ms)
    #[arg(long, env = "BEATSYNC_AUTOPLAY_DEBOUNCE_MS")]
    pub autoplay_debounce_ms: Option<u64>,

    /// Timeout for each external playback call (ms)
    #[arg(long, env = "BEATSYNC_PLAYBACK_TIMEOUT_MS")]
    pub playback_timeout_ms: Option<u64>,

    /// Events buffered per subscriber before it is resynced
    #[arg(long, env = "BEATSYNC_EVENT_CAPACITY")]
    pub event_capacity: Option<usize>,

    #[arg(long, env = "BEATSYNC_CHAT_HISTORY_LIMIT")]
    pub chat_history_limit: Option<u32>,

    #[arg(long, env = "BEATSYNC_CHAT_HISTORY_TTL_SECS")]
    pub chat_history_ttl_secs: Option<u64>,

    /// Cache backend: memory or sqlite
    #[arg(long, env = "BEATSYNC_SNAPSHOT_BACKEND")]
    pub snapshot_backend: Option<SnapshotBackend>,

    /// Playback provider: spotify or offline
    #[arg(long, env = "BEATSYNC_PLAYBACK_PROVIDER")]
    pub playback_provider: Option<PlaybackProviderKind>,

    /// Base URL of the provider's Web API
    #[arg(long, env = "BEATSYNC_PLAYBACK_API_BASE")]
    pub playback_api_base: Option<String>,

    /// Path to a config file (skips the platform search)
    #[arg(long, env = "BEATSYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub event_capacity: usize,
    pub snapshot_backend: SnapshotBackend,
    pub playback_provider: PlaybackProviderKind,
    pub playback_api_base: String,
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Merge CLI/env arguments over `file` over compiled defaults
    pub fn resolve(args: Args, file: TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = match args.root_folder.or(file.root_folder) {
            Some(path) => path,
            None => RootFolderResolver::new("beatsync-server").resolve(),
        };
        let database_file = args
            .database_file
            .or(file.database_file)
            .unwrap_or(defaults.database_file);
        let database_path = RootFolderInitializer::new(root_folder.clone()).database_path(&database_file);

        let engine = EngineConfig {
            autoplay_debounce: Duration::from_millis(
                args.autoplay_debounce_ms
                    .or(file.autoplay_debounce_ms)
                    .unwrap_or(defaults.autoplay_debounce_ms),
            ),
            playback_timeout: Duration::from_millis(
                args.playback_timeout_ms
                    .or(file.playback_timeout_ms)
                    .unwrap_or(defaults.playback_timeout_ms),
            ),
            chat_history_limit: args
                .chat_history_limit
                .or(file.chat_history_limit)
                .unwrap_or(defaults.chat_history_limit),
            chat_history_ttl: Duration::from_secs(
                args.chat_history_ttl_secs
                    .or(file.chat_history_ttl_secs)
                    .unwrap_or(defaults.chat_history_ttl_secs),
            ),
        };

        Self {
            root_folder,
            database_path,
            bind_addr: args.bind_addr.or(file.bind_addr).unwrap_or(defaults.bind_addr),
            event_capacity: args
                .event_capacity
                .or(file.event_capacity)
                .unwrap_or(defaults.event_capacity),
            snapshot_backend: args
                .snapshot_backend
                .or(file.snapshot_backend)
                .unwrap_or(defaults.snapshot_backend),
            playback_provider: args
                .playback_provider
                .or(file.playback_provider)
                .unwrap_or(defaults.playback_provider),
            playback_api_base: args
                .playback_api_base
                .or(file.playback_api_base)
                .unwrap_or(defaults.playback_api_base),
            engine,
        }
    }
}
