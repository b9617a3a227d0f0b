//! Configuration loading and root folder resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`BEATSYNC_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module covers layers 3 and 4 plus root folder resolution. The CLI and
//! environment layers are parsed by each binary and merged on top.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "BEATSYNC_ROOT_FOLDER";

/// Database filename used when neither CLI nor config names one
pub const DEFAULT_DATABASE_FILE: &str = "beatsync.db";

/// Where the queue snapshot and chat history caches live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotBackend {
    /// In-process cache, private to this server
    #[default]
    Memory,
    /// `cache_entries` table, shared by every process on the database
    Sqlite,
}

impl FromStr for SnapshotBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown snapshot backend '{}' (expected memory or sqlite)", other)),
        }
    }
}

/// Which external playback client the server drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackProviderKind {
    /// Spotify Web API, authorized with the host's access token
    #[default]
    Spotify,
    /// Accept every command locally without contacting a provider
    Offline,
}

impl FromStr for PlaybackProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spotify" => Ok(Self::Spotify),
            "offline" => Ok(Self::Offline),
            other => Err(format!("unknown playback provider '{}' (expected spotify or offline)", other)),
        }
    }
}

/// Contents of `config.toml`
///
/// Every field is optional; a missing file or missing key falls through to
/// [`CompiledDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub database_file: Option<String>,
    pub autoplay_debounce_ms: Option<u64>,
    pub playback_timeout_ms: Option<u64>,
    pub event_capacity: Option<usize>,
    pub chat_history_limit: Option<u32>,
    pub chat_history_ttl_secs: Option<u64>,
    pub snapshot_backend: Option<SnapshotBackend>,
    pub playback_provider: Option<PlaybackProviderKind>,
    pub playback_api_base: Option<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse config text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the platform config file if one exists.
    ///
    /// A missing file yields the empty config. A malformed file is logged and
    /// ignored so the server still starts on compiled defaults.
    pub fn load_or_default() -> Self {
        match find_config_file() {
            Some(path) => match Self::load(&path) {
                Ok(config) => {
                    debug!("Loaded config file: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring unreadable config file: {}", e);
                    Self::default()
                }
            },
            None => {
                debug!("No config file found, using compiled defaults");
                Self::default()
            }
        }
    }
}

/// Compiled-in fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub database_file: String,
    pub autoplay_debounce_ms: u64,
    pub playback_timeout_ms: u64,
    pub event_capacity: usize,
    pub chat_history_limit: u32,
    pub chat_history_ttl_secs: u64,
    pub snapshot_backend: SnapshotBackend,
    pub playback_provider: PlaybackProviderKind,
    pub playback_api_base: String,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            bind_addr: "127.0.0.1:5780".to_string(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            autoplay_debounce_ms: 2000,
            playback_timeout_ms: 5000,
            event_capacity: 1000,
            chat_history_limit: 50,
            chat_history_ttl_secs: 30,
            snapshot_backend: SnapshotBackend::Memory,
            playback_provider: PlaybackProviderKind::Spotify,
            playback_api_base: "https://api.spotify.com/v1".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Resolves the root folder (database and other state live beneath it)
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Set the value passed on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Resolve the root folder. Never fails: the compiled default is the
    /// final fallback.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                debug!("{}: root folder from {}", self.module_name, ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = TomlConfig::load_or_default().root_folder {
            debug!("{}: root folder from config file", self.module_name);
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    /// Database path for `database_file`; absolute names are used as-is
    pub fn database_path(&self, database_file: &str) -> PathBuf {
        let file = Path::new(database_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root_folder.join(file)
        }
    }
}

/// Locate the platform config file.
///
/// Linux checks `~/.config/beatsync/config.toml` then `/etc/beatsync/config.toml`;
/// other platforms check the user config directory only.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("beatsync").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/beatsync/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("beatsync"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\beatsync"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("beatsync"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/beatsync"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("beatsync"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/beatsync"))
    }
}
