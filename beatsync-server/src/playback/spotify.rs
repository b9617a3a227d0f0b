use super::{HostCredentials, PlaybackProvider, ProviderError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Spotify Web API player client
pub struct SpotifyPlayback {
    client: Client,
    api_base: String,
    credentials: HostCredentials,
}

impl SpotifyPlayback {
    pub fn new(
        api_base: impl Into<String>,
        credentials: HostCredentials,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn player_url(&self, action: &str) -> String {
        format!("{}/me/player/{}", self.api_base, action)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<(), ProviderError> {
        let token = self
            .credentials
            .access_token()
            .await
            .ok_or(ProviderError::NotAuthorized)?;

        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        if status.is_success() {
            debug!("Spotify {} accepted ({})", action, status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Spotify {} rejected ({}): {}", action, status, body);
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn with_device(request: RequestBuilder, device_id: Option<&str>) -> RequestBuilder {
    match device_id {
        Some(id) => request.query(&[("device_id", id)]),
        None => request,
    }
}

#[async_trait]
impl PlaybackProvider for SpotifyPlayback {
    async fn start_playback(&self, track_uri: &str, device_id: Option<&str>) -> Result<(), ProviderError> {
        let request = with_device(self.client.put(self.player_url("play")), device_id)
            .json(&json!({ "uris": [track_uri] }));
        self.send(request, "play").await
    }

    async fn resume_playback(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
        let request = with_device(self.client.put(self.player_url("play")), device_id)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request, "resume").await
    }

    async fn pause_playback(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
        let request = with_device(self.client.put(self.player_url("pause")), device_id)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request, "pause").await
    }

    fn name(&self) -> &'static str {
        "spotify"
    }
}
