//! Chat endpoints

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use beatsync_common::db::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::engine::Caller;
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
}

/// POST /chat
pub async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatMessage>)> {
    let saved = state.engine.send_chat(&caller, &req.message).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /chat
pub async fn history(State(state): State<AppState>) -> Result<Json<ChatHistoryResponse>> {
    let messages = state.engine.chat_history().await?;
    Ok(Json(ChatHistoryResponse { messages }))
}

pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/chat", get(history).post(send_message))
}
