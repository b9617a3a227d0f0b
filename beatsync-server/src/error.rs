//! Error types for beatsync-server
//!
//! Every operation of the coordination engine returns [`Error`]. Each variant
//! belongs to one [`ErrorKind`], which decides the HTTP status and whether
//! state may have changed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::cache::CacheError;
use crate::playback::ProviderError;

/// Error classes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, rejected before storage is touched
    Validation,
    /// Caller lacks the required role
    Authorization,
    /// Request conflicts with current state
    Conflict,
    NotFound,
    /// External playback provider failed or timed out
    ExternalFailure,
    /// Database or cache tier failure
    Storage,
    Internal,
}

/// Main error type for beatsync-server
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed vote type, missing track fields, empty chat message
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session, or the token is unknown
    #[error("Authentication required")]
    Unauthorized,

    /// Session exists but lacks the role for this action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Track already queued: {0}")]
    AlreadyQueued(String),

    #[error("Track is currently playing: {0}")]
    CurrentlyPlaying(String),

    /// Selected track was removed or replaced before the removal committed
    #[error("Queue entry changed during auto-play: {0}")]
    Mismatch(String),

    #[error("Auto-play triggered too soon after the previous one")]
    TooSoon,

    #[error("Queue is empty")]
    QueueEmpty,

    #[error("A host is already connected")]
    HostTaken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using beatsync-server Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Unauthorized | Error::Forbidden(_) => ErrorKind::Authorization,
            Error::AlreadyQueued(_)
            | Error::CurrentlyPlaying(_)
            | Error::Mismatch(_)
            | Error::TooSoon
            | Error::QueueEmpty
            | Error::HostTaken => ErrorKind::Conflict,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::PlaybackFailed(_) => ErrorKind::ExternalFailure,
            Error::Database(_) | Error::Cache(_) => ErrorKind::Storage,
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for the JSON body
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Unauthorized => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::AlreadyQueued(_) => "already_queued",
            Error::CurrentlyPlaying(_) => "currently_playing",
            Error::Mismatch(_) => "mismatch",
            Error::TooSoon => "too_soon",
            Error::QueueEmpty => "queue_empty",
            Error::HostTaken => "host_taken",
            Error::NotFound(_) => "not_found",
            Error::PlaybackFailed(_) => "playback_failed",
            Error::Database(_) | Error::Cache(_) => "storage_failure",
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::TooSoon => StatusCode::TOO_MANY_REQUESTS,
            Error::AlreadyQueued(_)
            | Error::CurrentlyPlaying(_)
            | Error::Mismatch(_)
            | Error::QueueEmpty
            | Error::HostTaken => StatusCode::CONFLICT,
            Error::PlaybackFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<beatsync_common::Error> for Error {
    fn from(err: beatsync_common::Error) -> Self {
        match err {
            beatsync_common::Error::Database(e) => Error::Database(e),
            beatsync_common::Error::Io(e) => Error::Io(e),
            beatsync_common::Error::Config(msg) => Error::Config(msg),
            e @ beatsync_common::Error::SchemaTooNew { .. } => Error::Config(e.to_string()),
        }
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::PlaybackFailed(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.code(),
            "kind": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
