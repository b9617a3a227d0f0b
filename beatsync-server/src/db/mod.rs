//! Database operations for the coordination engine
//!
//! Free functions over any SQLite executor, so the same query runs against the
//! pool or inside a caller's transaction.

pub mod chat;
pub mod gate;
pub mod now_playing;
pub mod queue;
pub mod sessions;
pub mod votes;

/// True when `err` is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
