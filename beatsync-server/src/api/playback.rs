//! Playback endpoints (host only, except now-playing)

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use beatsync_common::db::NowPlaying;
use serde::{Deserialize, Serialize};

use crate::engine::{Caller, PlaybackResult};
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DeviceRequest {
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    #[serde(default)]
    pub track_uri: String,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NowPlayingResponse {
    pub now_playing: Option<NowPlaying>,
}

fn device_of(body: Option<Json<DeviceRequest>>) -> Option<String> {
    body.and_then(|Json(req)| req.device_id)
        .filter(|d| !d.is_empty())
}

/// POST /playback/auto-play
///
/// Body is optional; `{"device_id": ".."}` targets a specific device.
pub async fn auto_play(
    State(state): State<AppState>,
    caller: Caller,
    body: Option<Json<DeviceRequest>>,
) -> Result<Json<PlaybackResult>> {
    let result = state
        .engine
        .trigger_autoplay(&caller, device_of(body))
        .await?;
    Ok(Json(result))
}

/// POST /playback/play
pub async fn play(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<PlayRequest>,
) -> Result<Json<NowPlaying>> {
    let playing = state
        .engine
        .play(
            &caller,
            &req.track_uri,
            req.track_name.as_deref(),
            req.device_id.filter(|d| !d.is_empty()),
        )
        .await?;
    Ok(Json(playing))
}

/// POST /playback/resume
pub async fn resume(
    State(state): State<AppState>,
    caller: Caller,
    body: Option<Json<DeviceRequest>>,
) -> Result<Json<NowPlaying>> {
    Ok(Json(state.engine.resume(&caller, device_of(body)).await?))
}

/// POST /playback/pause
pub async fn pause(
    State(state): State<AppState>,
    caller: Caller,
    body: Option<Json<DeviceRequest>>,
) -> Result<Json<NowPlayingResponse>> {
    let now_playing = state.engine.pause(&caller, device_of(body)).await?;
    Ok(Json(NowPlayingResponse { now_playing }))
}

/// GET /playback/now-playing
pub async fn now_playing(State(state): State<AppState>) -> Result<Json<NowPlayingResponse>> {
    let now_playing = state.engine.now_playing().await?;
    Ok(Json(NowPlayingResponse { now_playing }))
}

pub fn playback_routes() -> Router<AppState> {
    Router::new()
        .route("/playback/auto-play", post(auto_play))
        .route("/playback/play", post(play))
        .route("/playback/resume", post(resume))
        .route("/playback/pause", post(pause))
        .route("/playback/now-playing", get(now_playing))
}
