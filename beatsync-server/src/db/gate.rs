//! Auto-play debounce stamp
//!
//! The last accepted trigger time lives in the `autoplay_gate` row so every
//! process sharing the database observes the same window.

use crate::error::Result;
use sqlx::SqliteConnection;

/// A successfully claimed debounce slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateClaim {
    pub previous_ms: i64,
    pub claimed_ms: i64,
}

/// Claim the debounce window at `now_ms`.
///
/// Compare-and-set on the previously stored value: returns None if a trigger
/// was accepted less than `window_ms` ago, or if another process claimed the
/// row between the read and the update. A stamp later than `now_ms` (the
/// clock moved backwards) does not block the claim.
pub async fn try_claim(
    conn: &mut SqliteConnection,
    now_ms: i64,
    window_ms: i64,
) -> Result<Option<GateClaim>> {
    let previous_ms: i64 =
        sqlx::query_scalar("SELECT last_accepted_ms FROM autoplay_gate WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?
            .unwrap_or(0);

    // A clock that stepped back past the stamp cannot hold the window closed
    if now_ms >= previous_ms && now_ms - previous_ms < window_ms {
        return Ok(None);
    }

    let result = sqlx::query(
        "UPDATE autoplay_gate SET last_accepted_ms = ? WHERE id = 1 AND last_accepted_ms = ?",
    )
    .bind(now_ms)
    .bind(previous_ms)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        Ok(Some(GateClaim {
            previous_ms,
            claimed_ms: now_ms,
        }))
    } else {
        Ok(None)
    }
}

/// Undo a claim, unless a later trigger already replaced it
pub async fn release(conn: &mut SqliteConnection, claim: GateClaim) -> Result<()> {
    sqlx::query(
        "UPDATE autoplay_gate SET last_accepted_ms = ? WHERE id = 1 AND last_accepted_ms = ?",
    )
    .bind(claim.previous_ms)
    .bind(claim.claimed_ms)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatsync_common::db::init_memory_database;

    #[tokio::test]
    async fn test_second_claim_inside_window_rejected() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert!(try_claim(&mut conn, 10_000, 2000).await.unwrap().is_some());
        assert!(try_claim(&mut conn, 11_999, 2000).await.unwrap().is_none());
        assert!(try_claim(&mut conn, 12_000, 2000).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_reopens_window() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let claim = try_claim(&mut conn, 10_000, 2000).await.unwrap().unwrap();
        release(&mut conn, claim).await.unwrap();

        assert!(try_claim(&mut conn, 10_001, 2000).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clock_stepped_back_still_claims() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert!(try_claim(&mut conn, 10_000, 2000).await.unwrap().is_some());

        let claim = try_claim(&mut conn, 5_000, 2000).await.unwrap().unwrap();
        assert_eq!(claim.previous_ms, 10_000);
        assert_eq!(claim.claimed_ms, 5_000);

        // The window now runs from the new stamp
        assert!(try_claim(&mut conn, 6_000, 2000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_window_always_claims() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert!(try_claim(&mut conn, 5, 0).await.unwrap().is_some());
        assert!(try_claim(&mut conn, 5, 0).await.unwrap().is_some());
    }
}
