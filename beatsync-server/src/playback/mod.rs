//! External playback control
//!
//! The coordination engine starts, resumes and pauses playback on the host's
//! device through a [`PlaybackProvider`]. Calls may take a network round trip;
//! the engine bounds each one with a timeout.

mod scripted;
mod spotify;

pub use scripted::{PlaybackCall, ScriptedPlayback, MAX_RECORDED_CALLS};
pub use spotify::SpotifyPlayback;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// No host access token is available
    #[error("no provider credentials (host not signed in)")]
    NotAuthorized,

    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Start playing `track_uri`, on `device_id` when given
    async fn start_playback(&self, track_uri: &str, device_id: Option<&str>) -> Result<(), ProviderError>;

    async fn resume_playback(&self, device_id: Option<&str>) -> Result<(), ProviderError>;

    async fn pause_playback(&self, device_id: Option<&str>) -> Result<(), ProviderError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// The host's provider access token, shared with the playback client
#[derive(Clone, Default)]
pub struct HostCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl HostCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, access_token: Option<String>) {
        *self.token.write().await = access_token;
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}
