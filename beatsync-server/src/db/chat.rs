//! Chat message persistence

use crate::error::Result;
use beatsync_common::db::ChatMessage;
use chrono::Utc;
use sqlx::SqliteExecutor;

pub async fn insert(
    db: impl SqliteExecutor<'_>,
    display_name: &str,
    message: &str,
) -> Result<ChatMessage> {
    let row = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO chat_messages (display_name, message, sent_at)
        VALUES (?, ?, ?)
        RETURNING id, display_name, message, sent_at
        "#,
    )
    .bind(display_name)
    .bind(message)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;

    Ok(row)
}

/// The most recent `limit` messages, oldest first
pub async fn recent(db: impl SqliteExecutor<'_>, limit: u32) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, display_name, message, sent_at FROM (
            SELECT id, display_name, message, sent_at
            FROM chat_messages
            ORDER BY id DESC
            LIMIT ?
        )
        ORDER BY id ASC
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Id of the newest message, 0 when there are none.
///
/// Ids are never reused, so this changes whenever the history does.
pub async fn latest_id(db: impl SqliteExecutor<'_>) -> Result<i64> {
    let id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM chat_messages")
        .fetch_one(db)
        .await?;
    Ok(id)
}

pub async fn clear(db: impl SqliteExecutor<'_>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM chat_messages").execute(db).await?;
    Ok(result.rows_affected())
}
