//! Chat messages
//!
//! History is a secondary read-heavy view cached with a TTL. The cached copy
//! records the newest message id it contains and is only served while that is
//! still the newest id, so a slow cache write cannot resurrect old history.

use super::core::Engine;
use super::sessions::Caller;
use super::MAX_CHAT_MESSAGE_CHARS;
use crate::db::chat;
use crate::error::{Error, Result};
use beatsync_common::db::ChatMessage;
use beatsync_common::events::BeatSyncEvent;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CHAT_HISTORY_KEY: &str = "chat_history";

#[derive(Debug, Serialize, Deserialize)]
struct CachedHistory {
    latest_id: i64,
    messages: Vec<ChatMessage>,
}

impl Engine {
    pub async fn send_chat(&self, caller: &Caller, message: &str) -> Result<ChatMessage> {
        let session = caller.require_participant()?;

        let message = message.trim();
        if message.is_empty() {
            return Err(Error::Validation("message must not be empty".to_string()));
        }
        if message.chars().count() > MAX_CHAT_MESSAGE_CHARS {
            return Err(Error::Validation(format!(
                "message exceeds {} characters",
                MAX_CHAT_MESSAGE_CHARS
            )));
        }

        let _seq = self.sequencer.lock().await;
        let saved = chat::insert(&self.db, &session.display_name, message).await?;
        self.invalidate_chat_history().await;

        self.hub.publish(BeatSyncEvent::ChatMessage {
            message: saved.clone(),
            timestamp: Utc::now(),
        });

        debug!("Chat from {}", saved.display_name);
        Ok(saved)
    }

    /// Most recent messages, oldest first
    pub async fn chat_history(&self) -> Result<Vec<ChatMessage>> {
        let cache = self.snapshot.backend();

        let cached = match cache.get(CHAT_HISTORY_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<CachedHistory>(&raw) {
                Ok(cached) => Some(cached),
                Err(e) => {
                    warn!("Discarding undecodable chat history cache: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("{} cache read failed for chat history: {}", cache.name(), e);
                None
            }
        };

        let mut tx = self.db.begin().await?;
        let latest_id = chat::latest_id(&mut *tx).await?;
        if let Some(cached) = cached.filter(|c| c.latest_id == latest_id) {
            tx.commit().await?;
            return Ok(cached.messages);
        }
        let messages = chat::recent(&mut *tx, self.config.chat_history_limit).await?;
        tx.commit().await?;

        let fresh = CachedHistory {
            latest_id,
            messages,
        };
        match serde_json::to_string(&fresh) {
            Ok(encoded) => {
                if let Err(e) = cache
                    .set(CHAT_HISTORY_KEY, encoded, Some(self.config.chat_history_ttl))
                    .await
                {
                    warn!("{} cache write failed for chat history: {}", cache.name(), e);
                }
            }
            Err(e) => warn!("Failed to encode chat history for cache: {}", e),
        }

        Ok(fresh.messages)
    }

    pub(super) async fn invalidate_chat_history(&self) {
        let cache = self.snapshot.backend();
        if let Err(e) = cache.delete(CHAT_HISTORY_KEY).await {
            warn!("{} cache delete failed for chat history: {}", cache.name(), e);
        }
    }
}
