//! Database initialization tests

use beatsync_common::db::{create_schema, init_database, init_memory_database, SCHEMA_VERSION};
use beatsync_common::Error;
use sqlx::Row;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("beatsync.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("beatsync.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO queue_entries (track_uri, track_name, enqueued_at) VALUES ('a', 'A', CURRENT_TIMESTAMP)")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries")
        .fetch_one(&pool2)
        .await
        .unwrap();

    assert_eq!(count, 1, "Existing rows must survive re-initialization");
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&pool)
        .await
        .unwrap();
    let tables: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();

    for expected in [
        "schema_version",
        "queue_entries",
        "votes",
        "now_playing",
        "chat_messages",
        "sessions",
        "cache_entries",
        "autoplay_gate",
        "state_version",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_queue_rejects_duplicate_track_uri() {
    let pool = init_memory_database().await.unwrap();

    let insert = "INSERT INTO queue_entries (track_uri, track_name, enqueued_at) VALUES ('dup', 'Dup', CURRENT_TIMESTAMP)";
    sqlx::query(insert).execute(&pool).await.unwrap();
    assert!(sqlx::query(insert).execute(&pool).await.is_err());
}

#[tokio::test]
async fn test_single_host_index() {
    let pool = init_memory_database().await.unwrap();

    let insert_host = |token: &'static str| {
        sqlx::query(
            "INSERT INTO sessions (token, role, display_name, created_at) VALUES (?, 'host', 'Host', CURRENT_TIMESTAMP)",
        )
        .bind(token)
    };

    insert_host("t1").execute(&pool).await.unwrap();
    assert!(insert_host("t2").execute(&pool).await.is_err(), "second host must be rejected");

    // Any number of listeners
    for (token, n) in [("l1", 1), ("l2", 2)] {
        sqlx::query(
            "INSERT INTO sessions (token, role, display_name, listener_number, created_at) VALUES (?, 'listener', 'L', ?, CURRENT_TIMESTAMP)",
        )
        .bind(token)
        .bind(n)
        .execute(&pool)
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_autoplay_gate_seeded_once() {
    let pool = init_memory_database().await.unwrap();
    beatsync_common::db::create_schema(&pool).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM autoplay_gate")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_state_version_bumps_on_queue_and_vote_changes() {
    let pool = init_memory_database().await.unwrap();
    let version = || sqlx::query_scalar::<_, i64>("SELECT version FROM state_version WHERE id = 1");

    let v0 = version().fetch_one(&pool).await.unwrap();

    sqlx::query("INSERT INTO queue_entries (track_uri, track_name, enqueued_at) VALUES ('a', 'A', CURRENT_TIMESTAMP)")
        .execute(&pool)
        .await
        .unwrap();
    let v1 = version().fetch_one(&pool).await.unwrap();
    assert!(v1 > v0);

    sqlx::query("INSERT INTO votes (track_uri, vote_type, voter_id, cast_at) VALUES ('a', 'up', 'x', CURRENT_TIMESTAMP)")
        .execute(&pool)
        .await
        .unwrap();
    let v2 = version().fetch_one(&pool).await.unwrap();
    assert!(v2 > v1);

    // Chat does not affect cached queue state
    sqlx::query("INSERT INTO chat_messages (display_name, message, sent_at) VALUES ('L', 'hi', CURRENT_TIMESTAMP)")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(version().fetch_one(&pool).await.unwrap(), v2);
}

#[tokio::test]
async fn test_newer_schema_refused() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION + 1)
        .execute(&pool)
        .await
        .unwrap();

    let result = create_schema(&pool).await;

    assert!(matches!(
        result,
        Err(Error::SchemaTooNew { found, supported }) if found == SCHEMA_VERSION + 1 && supported == SCHEMA_VERSION
    ));
}
