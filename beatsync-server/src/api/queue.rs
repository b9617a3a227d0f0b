//! Queue and vote endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use beatsync_common::db::QueueEntry;
use beatsync_common::events::QueueSnapshot;
use serde::{Deserialize, Serialize};

use crate::engine::{Caller, VoteOutcome};
use crate::error::Result;
use crate::selector::TrackChoice;
use crate::AppState;

// Missing fields deserialize as empty and are rejected by the engine as
// validation errors rather than extractor rejections.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub track_uri: String,
    #[serde(default)]
    pub track_name: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub vote_type: String,
    /// Echoed back in the vote event for optimistic UI reconciliation
    #[serde(default)]
    pub client_vote_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NextTrackResponse {
    pub track: Option<TrackChoice>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub items_removed: u64,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub removed: Option<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct VoteCountsResponse {
    pub track_uri: String,
    pub up_votes: i64,
    pub down_votes: i64,
    pub net_score: i64,
}

/// GET /queue
pub async fn get_queue(State(state): State<AppState>) -> Result<Json<QueueSnapshot>> {
    Ok(Json(state.engine.get_queue().await?))
}

/// GET /queue/next
pub async fn next_track(State(state): State<AppState>) -> Result<Json<NextTrackResponse>> {
    let track = state.engine.next_track_preview().await?;
    Ok(Json(NextTrackResponse { track }))
}

/// POST /queue
pub async fn enqueue(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<QueueEntry>)> {
    let entry = state
        .engine
        .enqueue(&caller, &req.track_uri, &req.track_name)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /queue/:track_uri
pub async fn remove_track(
    State(state): State<AppState>,
    caller: Caller,
    Path(track_uri): Path<String>,
) -> Result<Json<QueueEntry>> {
    Ok(Json(state.engine.remove_track(&caller, &track_uri).await?))
}

/// POST /queue/clear
pub async fn clear_queue(State(state): State<AppState>, caller: Caller) -> Result<Json<ClearResponse>> {
    let items_removed = state.engine.clear_queue(&caller).await?;
    Ok(Json(ClearResponse { items_removed }))
}

/// POST /queue/reconcile
pub async fn reconcile(State(state): State<AppState>, caller: Caller) -> Result<Json<ReconcileResponse>> {
    let removed = state.engine.reconcile(&caller).await?;
    Ok(Json(ReconcileResponse { removed }))
}

/// POST /queue/:track_uri/votes
pub async fn cast_vote(
    State(state): State<AppState>,
    caller: Caller,
    Path(track_uri): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<(StatusCode, Json<VoteOutcome>)> {
    let outcome = state
        .engine
        .cast_vote(&caller, &track_uri, &req.vote_type, req.client_vote_id)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /queue/:track_uri/votes
pub async fn vote_counts(
    State(state): State<AppState>,
    Path(track_uri): Path<String>,
) -> Result<Json<VoteCountsResponse>> {
    let counts = state.engine.counts_for(&track_uri).await?;
    Ok(Json(VoteCountsResponse {
        track_uri,
        up_votes: counts.up,
        down_votes: counts.down,
        net_score: counts.net_score(),
    }))
}

pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue", get(get_queue).post(enqueue))
        .route("/queue/next", get(next_track))
        .route("/queue/clear", post(clear_queue))
        .route("/queue/reconcile", post(reconcile))
        .route("/queue/:track_uri", delete(remove_track))
        .route("/queue/:track_uri/votes", post(cast_vote).get(vote_counts))
}
