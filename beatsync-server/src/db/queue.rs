//! Queue Store operations
//!
//! Entries are listed in insertion order (`id` ascending), which is enqueue
//! order. `track_uri` is UNIQUE while the entry exists.

use crate::db::is_unique_violation;
use crate::error::{Error, Result};
use beatsync_common::db::QueueEntry;
use chrono::Utc;
use sqlx::SqliteExecutor;

/// Append a track to the queue
///
/// Returns `AlreadyQueued` if the track is already present.
pub async fn enqueue(
    db: impl SqliteExecutor<'_>,
    track_uri: &str,
    track_name: &str,
) -> Result<QueueEntry> {
    let result = sqlx::query_as::<_, QueueEntry>(
        r#"
        INSERT INTO queue_entries (track_uri, track_name, enqueued_at)
        VALUES (?, ?, ?)
        RETURNING id, track_uri, track_name, enqueued_at
        "#,
    )
    .bind(track_uri)
    .bind(track_name)
    .bind(Utc::now())
    .fetch_one(db)
    .await;

    match result {
        Ok(entry) => Ok(entry),
        Err(e) if is_unique_violation(&e) => Err(Error::AlreadyQueued(track_uri.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// All entries, oldest first
pub async fn list(db: impl SqliteExecutor<'_>) -> Result<Vec<QueueEntry>> {
    let entries = sqlx::query_as::<_, QueueEntry>(
        "SELECT id, track_uri, track_name, enqueued_at FROM queue_entries ORDER BY id ASC",
    )
    .fetch_all(db)
    .await?;

    Ok(entries)
}

pub async fn find(db: impl SqliteExecutor<'_>, track_uri: &str) -> Result<Option<QueueEntry>> {
    let entry = sqlx::query_as::<_, QueueEntry>(
        "SELECT id, track_uri, track_name, enqueued_at FROM queue_entries WHERE track_uri = ?",
    )
    .bind(track_uri)
    .fetch_optional(db)
    .await?;

    Ok(entry)
}

/// Delete one entry by track URI, returning it if it was present
pub async fn remove(db: impl SqliteExecutor<'_>, track_uri: &str) -> Result<Option<QueueEntry>> {
    let entry = sqlx::query_as::<_, QueueEntry>(
        r#"
        DELETE FROM queue_entries WHERE track_uri = ?
        RETURNING id, track_uri, track_name, enqueued_at
        "#,
    )
    .bind(track_uri)
    .fetch_optional(db)
    .await?;

    Ok(entry)
}

/// Delete every entry, returning how many were removed
pub async fn clear(db: impl SqliteExecutor<'_>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM queue_entries").execute(db).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatsync_common::db::init_memory_database;

    #[tokio::test]
    async fn test_enqueue_then_list_in_fifo_order() {
        let pool = init_memory_database().await.unwrap();

        enqueue(&pool, "spotify:track:b", "B").await.unwrap();
        enqueue(&pool, "spotify:track:a", "A").await.unwrap();
        enqueue(&pool, "spotify:track:c", "C").await.unwrap();

        let uris: Vec<String> = list(&pool).await.unwrap().into_iter().map(|e| e.track_uri).collect();
        assert_eq!(uris, vec!["spotify:track:b", "spotify:track:a", "spotify:track:c"]);
    }

    #[tokio::test]
    async fn test_enqueue_duplicate_rejected() {
        let pool = init_memory_database().await.unwrap();

        enqueue(&pool, "spotify:track:1", "One").await.unwrap();
        let err = enqueue(&pool, "spotify:track:1", "One again").await.unwrap_err();

        assert!(matches!(err, Error::AlreadyQueued(uri) if uri == "spotify:track:1"));
        assert_eq!(list(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_returns_entry_once() {
        let pool = init_memory_database().await.unwrap();
        let added = enqueue(&pool, "spotify:track:1", "One").await.unwrap();

        let removed = remove(&pool, "spotify:track:1").await.unwrap();
        assert_eq!(removed, Some(added));
        assert_eq!(remove(&pool, "spotify:track:1").await.unwrap(), None);
        assert!(find(&pool, "spotify:track:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requeue_after_remove_gets_new_id() {
        let pool = init_memory_database().await.unwrap();
        let first = enqueue(&pool, "spotify:track:1", "One").await.unwrap();
        remove(&pool, "spotify:track:1").await.unwrap();
        let second = enqueue(&pool, "spotify:track:1", "One").await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_clear_counts_rows() {
        let pool = init_memory_database().await.unwrap();
        enqueue(&pool, "a", "A").await.unwrap();
        enqueue(&pool, "b", "B").await.unwrap();

        assert_eq!(clear(&pool).await.unwrap(), 2);
        assert!(list(&pool).await.unwrap().is_empty());
    }
}
