//! NowPlaying persistence (singleton row)

use crate::error::Result;
use beatsync_common::db::NowPlaying;
use sqlx::SqliteExecutor;

pub async fn get(db: impl SqliteExecutor<'_>) -> Result<Option<NowPlaying>> {
    let row = sqlx::query_as::<_, NowPlaying>(
        "SELECT track_uri, track_name, is_playing, device_id, set_at FROM now_playing WHERE id = 1",
    )
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn set(db: impl SqliteExecutor<'_>, now_playing: &NowPlaying) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO now_playing (id, track_uri, track_name, is_playing, device_id, set_at)
        VALUES (1, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            track_uri = excluded.track_uri,
            track_name = excluded.track_name,
            is_playing = excluded.is_playing,
            device_id = excluded.device_id,
            set_at = excluded.set_at
        "#,
    )
    .bind(&now_playing.track_uri)
    .bind(&now_playing.track_name)
    .bind(now_playing.is_playing)
    .bind(&now_playing.device_id)
    .bind(now_playing.set_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Flip `is_playing` on the current track; None when nothing is set
pub async fn set_is_playing(
    db: impl SqliteExecutor<'_>,
    is_playing: bool,
    device_id: Option<&str>,
) -> Result<Option<NowPlaying>> {
    let row = sqlx::query_as::<_, NowPlaying>(
        r#"
        UPDATE now_playing
        SET is_playing = ?, device_id = COALESCE(?, device_id), set_at = ?
        WHERE id = 1
        RETURNING track_uri, track_name, is_playing, device_id, set_at
        "#,
    )
    .bind(is_playing)
    .bind(device_id)
    .bind(chrono::Utc::now())
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// Returns true if a row was cleared
pub async fn clear(db: impl SqliteExecutor<'_>) -> Result<bool> {
    let result = sqlx::query("DELETE FROM now_playing").execute(db).await?;
    Ok(result.rows_affected() > 0)
}
