//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table the
//! coordination engine needs. All statements are idempotent, so this runs on
//! every startup.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets snapshot reads proceed while a queue mutation commits
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema.
///
/// Every connection to `sqlite::memory:` is a separate database, so the pool
/// holds exactly one connection that is never recycled.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;

    let found: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    if let Some(found) = found.filter(|v| *v > SCHEMA_VERSION) {
        return Err(Error::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    create_queue_entries_table(pool).await?;
    create_votes_table(pool).await?;
    create_now_playing_table(pool).await?;
    create_chat_messages_table(pool).await?;
    create_sessions_table(pool).await?;
    create_cache_entries_table(pool).await?;
    create_autoplay_gate_table(pool).await?;
    create_state_version_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_queue_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            track_uri TEXT NOT NULL UNIQUE,
            track_name TEXT NOT NULL,
            enqueued_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            track_uri TEXT NOT NULL,
            vote_type TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
            voter_id TEXT NOT NULL,
            cast_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_track ON votes(track_uri, vote_type)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_now_playing_table(pool: &SqlitePool) -> Result<()> {
    // Singleton row; absent when nothing is playing
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS now_playing (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            track_uri TEXT NOT NULL,
            track_name TEXT NOT NULL,
            is_playing INTEGER NOT NULL,
            device_id TEXT,
            set_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_chat_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            display_name TEXT NOT NULL,
            message TEXT NOT NULL,
            sent_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            role TEXT NOT NULL CHECK (role IN ('host', 'listener')),
            user_id TEXT,
            display_name TEXT NOT NULL,
            listener_number INTEGER UNIQUE,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one host system-wide
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_single_host ON sessions(role) WHERE role = 'host'",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cache_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at_ms INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Monotonic counter bumped by triggers on every change to queue, votes or
/// now playing. Cached views record the version they were built from.
async fn create_state_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS state_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO state_version (id, version) VALUES (1, 0)")
        .execute(pool)
        .await?;

    for (table, operation) in [
        ("queue_entries", "INSERT"),
        ("queue_entries", "UPDATE"),
        ("queue_entries", "DELETE"),
        ("votes", "INSERT"),
        ("votes", "DELETE"),
        ("now_playing", "INSERT"),
        ("now_playing", "UPDATE"),
        ("now_playing", "DELETE"),
    ] {
        let trigger = format!(
            "CREATE TRIGGER IF NOT EXISTS trg_{table}_{op}_version AFTER {operation} ON {table} \
             BEGIN UPDATE state_version SET version = version + 1 WHERE id = 1; END",
            table = table,
            op = operation.to_lowercase(),
            operation = operation,
        );
        sqlx::query(&trigger).execute(pool).await?;
    }

    Ok(())
}

async fn create_autoplay_gate_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS autoplay_gate (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_accepted_ms INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO autoplay_gate (id, last_accepted_ms) VALUES (1, 0)")
        .execute(pool)
        .await?;

    Ok(())
}
