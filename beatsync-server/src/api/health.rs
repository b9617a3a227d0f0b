//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Currently connected event-stream clients
    pub connections: usize,
    pub uptime_secs: u64,
    pub playback_provider: String,
}

/// GET /health
///
/// No authentication.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "beatsync-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.engine.hub().subscriber_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        playback_provider: state.engine.playback_provider().to_string(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
