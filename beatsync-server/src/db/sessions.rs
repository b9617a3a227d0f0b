//! Session persistence
//!
//! One row per joined participant. The partial unique index on `role`
//! guarantees a single host, and the UNIQUE `listener_number` column keeps
//! listener slots distinct.

use crate::db::is_unique_violation;
use crate::error::{Error, Result};
use beatsync_common::db::{Role, Session};
use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor};

const SESSION_COLUMNS: &str =
    "token, role, user_id, display_name, listener_number, created_at";

/// Insert the host session; `HostTaken` if one already exists
pub async fn insert_host(
    db: impl SqliteExecutor<'_>,
    token: &str,
    user_id: Option<&str>,
    display_name: &str,
) -> Result<Session> {
    let result = sqlx::query_as::<_, Session>(&format!(
        "INSERT INTO sessions (token, role, user_id, display_name, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        SESSION_COLUMNS
    ))
    .bind(token)
    .bind(Role::Host)
    .bind(user_id)
    .bind(display_name)
    .bind(Utc::now())
    .fetch_one(db)
    .await;

    match result {
        Ok(session) => Ok(session),
        Err(e) if is_unique_violation(&e) => Err(Error::HostTaken),
        Err(e) => Err(e.into()),
    }
}

/// Smallest listener number not currently in use (numbers start at 1)
pub async fn next_listener_number(db: impl SqliteExecutor<'_>) -> Result<i64> {
    let taken: Vec<i64> = sqlx::query_scalar(
        "SELECT listener_number FROM sessions WHERE listener_number IS NOT NULL ORDER BY listener_number",
    )
    .fetch_all(db)
    .await?;

    let mut candidate = 1;
    for number in taken {
        if number == candidate {
            candidate += 1;
        } else if number > candidate {
            break;
        }
    }

    Ok(candidate)
}

/// Insert a listener session in the smallest free slot, named "Listener n"
///
/// Retries when a concurrent join claims the same slot first.
pub async fn insert_listener(conn: &mut SqliteConnection, token: &str) -> Result<Session> {
    const MAX_ATTEMPTS: usize = 8;

    for _ in 0..MAX_ATTEMPTS {
        let number = next_listener_number(&mut *conn).await?;

        let result = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (token, role, display_name, listener_number, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(token)
        .bind(Role::Listener)
        .bind(format!("Listener {}", number))
        .bind(number)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await;

        match result {
            Ok(session) => return Ok(session),
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Internal("could not allocate a listener number".to_string()))
}

pub async fn find(db: impl SqliteExecutor<'_>, token: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "SELECT {} FROM sessions WHERE token = ?",
        SESSION_COLUMNS
    ))
    .bind(token)
    .fetch_optional(db)
    .await?;

    Ok(session)
}

pub async fn host(db: impl SqliteExecutor<'_>) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "SELECT {} FROM sessions WHERE role = 'host'",
        SESSION_COLUMNS
    ))
    .fetch_optional(db)
    .await?;

    Ok(session)
}

/// Delete a session, returning it if it existed
pub async fn delete(db: impl SqliteExecutor<'_>, token: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "DELETE FROM sessions WHERE token = ? RETURNING {}",
        SESSION_COLUMNS
    ))
    .bind(token)
    .fetch_optional(db)
    .await?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatsync_common::db::init_memory_database;

    #[tokio::test]
    async fn test_single_host() {
        let pool = init_memory_database().await.unwrap();

        insert_host(&pool, "h1", Some("user-1"), "Alice").await.unwrap();
        let err = insert_host(&pool, "h2", Some("user-2"), "Bob").await.unwrap_err();

        assert!(matches!(err, Error::HostTaken));
        assert_eq!(host(&pool).await.unwrap().unwrap().token, "h1");
    }

    #[tokio::test]
    async fn test_listener_numbers_reuse_smallest_gap() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let l1 = insert_listener(&mut conn, "a").await.unwrap();
        let l2 = insert_listener(&mut conn, "b").await.unwrap();
        let l3 = insert_listener(&mut conn, "c").await.unwrap();
        assert_eq!(l1.display_name, "Listener 1");
        assert_eq!(l2.display_name, "Listener 2");
        assert_eq!(l3.listener_number, Some(3));

        delete(&mut *conn, "b").await.unwrap();
        let again = insert_listener(&mut conn, "d").await.unwrap();
        assert_eq!(again.display_name, "Listener 2");

        let next = insert_listener(&mut conn, "e").await.unwrap();
        assert_eq!(next.display_name, "Listener 4");
    }

    #[tokio::test]
    async fn test_find_and_delete() {
        let pool = init_memory_database().await.unwrap();
        insert_host(&pool, "h1", None, "Host").await.unwrap();

        assert_eq!(find(&pool, "h1").await.unwrap().unwrap().role, Role::Host);
        assert!(delete(&pool, "h1").await.unwrap().is_some());
        assert!(find(&pool, "h1").await.unwrap().is_none());
        assert!(host(&pool).await.unwrap().is_none());
    }
}
