//! Vote Ledger operations
//!
//! Votes are append-only rows. Counts are aggregated on demand.

use crate::error::Result;
use beatsync_common::db::{Vote, VoteCounts, VoteType};
use chrono::Utc;
use sqlx::SqliteExecutor;
use std::collections::HashMap;

/// Append a vote for a queued track
///
/// Returns None (and records nothing) when `track_uri` is not in the queue.
pub async fn cast_vote(
    db: impl SqliteExecutor<'_>,
    track_uri: &str,
    vote_type: VoteType,
    voter_id: &str,
) -> Result<Option<Vote>> {
    let vote = sqlx::query_as::<_, Vote>(
        r#"
        INSERT INTO votes (track_uri, vote_type, voter_id, cast_at)
        SELECT ?1, ?2, ?3, ?4
        WHERE EXISTS (SELECT 1 FROM queue_entries WHERE track_uri = ?1)
        RETURNING id, track_uri, vote_type, voter_id, cast_at
        "#,
    )
    .bind(track_uri)
    .bind(vote_type)
    .bind(voter_id)
    .bind(Utc::now())
    .fetch_optional(db)
    .await?;

    Ok(vote)
}

pub async fn counts_for(db: impl SqliteExecutor<'_>, track_uri: &str) -> Result<VoteCounts> {
    let (up, down): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(vote_type = 'up'), 0),
               COALESCE(SUM(vote_type = 'down'), 0)
        FROM votes
        WHERE track_uri = ?
        "#,
    )
    .bind(track_uri)
    .fetch_one(db)
    .await?;

    Ok(VoteCounts::new(up, down))
}

/// Counts for every track that has at least one vote
pub async fn counts_all(db: impl SqliteExecutor<'_>) -> Result<HashMap<String, VoteCounts>> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT track_uri,
               SUM(vote_type = 'up'),
               SUM(vote_type = 'down')
        FROM votes
        GROUP BY track_uri
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(uri, up, down)| (uri, VoteCounts::new(up, down)))
        .collect())
}

/// Delete all votes for a track, returning how many were removed
pub async fn purge_votes(db: impl SqliteExecutor<'_>, track_uri: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM votes WHERE track_uri = ?")
        .bind(track_uri)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}

pub async fn purge_all(db: impl SqliteExecutor<'_>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM votes").execute(db).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::queue;
    use beatsync_common::db::init_memory_database;

    #[tokio::test]
    async fn test_counts_three_up_one_down() {
        let pool = init_memory_database().await.unwrap();
        queue::enqueue(&pool, "t1", "Track 1").await.unwrap();

        for voter in ["a", "b", "c"] {
            cast_vote(&pool, "t1", VoteType::Up, voter).await.unwrap();
        }
        cast_vote(&pool, "t1", VoteType::Down, "d").await.unwrap();

        let counts = counts_for(&pool, "t1").await.unwrap();
        assert_eq!(counts, VoteCounts::new(3, 1));
        assert_eq!(counts.net_score(), 2);
    }

    #[tokio::test]
    async fn test_same_voter_may_vote_repeatedly() {
        let pool = init_memory_database().await.unwrap();
        queue::enqueue(&pool, "t1", "Track 1").await.unwrap();

        cast_vote(&pool, "t1", VoteType::Up, "same").await.unwrap();
        cast_vote(&pool, "t1", VoteType::Up, "same").await.unwrap();

        assert_eq!(counts_for(&pool, "t1").await.unwrap().up, 2);
    }

    #[tokio::test]
    async fn test_vote_for_unqueued_track_records_nothing() {
        let pool = init_memory_database().await.unwrap();

        let vote = cast_vote(&pool, "ghost", VoteType::Up, "a").await.unwrap();

        assert!(vote.is_none());
        assert_eq!(counts_for(&pool, "ghost").await.unwrap(), VoteCounts::default());
    }

    #[tokio::test]
    async fn test_purge_then_counts_zero() {
        let pool = init_memory_database().await.unwrap();
        queue::enqueue(&pool, "t1", "Track 1").await.unwrap();
        queue::enqueue(&pool, "t2", "Track 2").await.unwrap();
        cast_vote(&pool, "t1", VoteType::Up, "a").await.unwrap();
        cast_vote(&pool, "t1", VoteType::Down, "b").await.unwrap();
        cast_vote(&pool, "t2", VoteType::Up, "a").await.unwrap();

        assert_eq!(purge_votes(&pool, "t1").await.unwrap(), 2);
        assert_eq!(counts_for(&pool, "t1").await.unwrap(), VoteCounts::default());

        let all = counts_all(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["t2"], VoteCounts::new(1, 0));
    }
}
