use super::{PlaybackProvider, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// Calls kept by [`ScriptedPlayback`]; older ones are dropped
pub const MAX_RECORDED_CALLS: usize = 256;

/// A command received by [`ScriptedPlayback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCall {
    Start { track_uri: String, device_id: Option<String> },
    Resume { device_id: Option<String> },
    Pause { device_id: Option<String> },
}

/// Provider that accepts commands locally
///
/// Records the most recent calls and can be told to fail or to stall before
/// answering. Backs the `offline` provider setting and the integration tests.
#[derive(Default)]
pub struct ScriptedPlayback {
    calls: Mutex<VecDeque<PlaybackCall>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long before answering each call
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.delay.lock() {
            *d = delay;
        }
    }

    /// Recorded calls, oldest first
    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.calls
            .lock()
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Track URIs passed to `start_playback`, in call order
    pub fn started_tracks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlaybackCall::Start { track_uri, .. } => Some(track_uri),
                _ => None,
            })
            .collect()
    }

    async fn answer(&self, call: PlaybackCall) -> Result<(), ProviderError> {
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        info!("Playback command: {:?}", call);
        if let Ok(mut calls) = self.calls.lock() {
            if calls.len() == MAX_RECORDED_CALLS {
                calls.pop_front();
            }
            calls.push_back(call);
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(ProviderError::Unavailable("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PlaybackProvider for ScriptedPlayback {
    async fn start_playback(&self, track_uri: &str, device_id: Option<&str>) -> Result<(), ProviderError> {
        self.answer(PlaybackCall::Start {
            track_uri: track_uri.to_string(),
            device_id: device_id.map(str::to_string),
        })
        .await
    }

    async fn resume_playback(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
        self.answer(PlaybackCall::Resume {
            device_id: device_id.map(str::to_string),
        })
        .await
    }

    async fn pause_playback(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
        self.answer(PlaybackCall::Pause {
            device_id: device_id.map(str::to_string),
        })
        .await
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
