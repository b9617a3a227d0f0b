//! Session endpoints: joining, leaving and host lifecycle

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use beatsync_common::db::{Role, Session};
use serde::{Deserialize, Serialize};

use crate::engine::{Caller, HostStatus};
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HostJoinRequest {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Provider OAuth token used for playback calls on the host's behalf
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub token: String,
    pub role: Role,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_number: Option<i64>,
}

impl From<Session> for JoinResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            role: session.role,
            display_name: session.display_name,
            listener_number: session.listener_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub role: Role,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: &str) -> Json<Self> {
        Json(Self {
            status: status.to_string(),
        })
    }
}

/// POST /session/host
pub async fn join_host(
    State(state): State<AppState>,
    Json(req): Json<HostJoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>)> {
    let session = state
        .engine
        .join_as_host(req.user_id, &req.display_name, req.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// POST /session/listener
pub async fn join_listener(State(state): State<AppState>) -> Result<(StatusCode, Json<JoinResponse>)> {
    let session = state.engine.join_as_listener().await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// GET /session/host
pub async fn host_status(State(state): State<AppState>) -> Result<Json<HostStatus>> {
    Ok(Json(state.engine.host_status().await?))
}

/// GET /session/me
pub async fn whoami(caller: Caller) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        role: caller.role(),
        display_name: caller.display_name().map(str::to_string),
    })
}

/// DELETE /session
pub async fn leave(State(state): State<AppState>, caller: Caller) -> Result<Json<StatusResponse>> {
    state.engine.leave(&caller).await?;
    Ok(StatusResponse::new("left"))
}

/// POST /session/host/sign-out
pub async fn sign_out_host(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<StatusResponse>> {
    state.engine.sign_out_host(&caller).await?;
    Ok(StatusResponse::new("signed_out"))
}

/// POST /session/restart
pub async fn restart(State(state): State<AppState>, caller: Caller) -> Result<Json<StatusResponse>> {
    state.engine.restart_session(&caller).await?;
    Ok(StatusResponse::new("restarted"))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session/host", post(join_host).get(host_status))
        .route("/session/host/sign-out", post(sign_out_host))
        .route("/session/listener", post(join_listener))
        .route("/session/me", get(whoami))
        .route("/session", axum::routing::delete(leave))
        .route("/session/restart", post(restart))
}
