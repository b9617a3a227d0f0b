//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A track waiting in the shared queue
///
/// `id` is the insertion sequence; listing by `id` gives enqueue (FIFO) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: i64,
    pub track_uri: String,
    pub track_name: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Direction of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            other => Err(format!("vote_type must be 'up' or 'down', got '{}'", other)),
        }
    }
}

/// One recorded vote (votes are append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: i64,
    pub track_uri: String,
    pub vote_type: VoteType,
    pub voter_id: String,
    pub cast_at: DateTime<Utc>,
}

/// Aggregated vote counts for one track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub up: i64,
    pub down: i64,
}

impl VoteCounts {
    pub fn new(up: i64, down: i64) -> Self {
        Self { up, down }
    }

    /// `up - down`
    pub fn net_score(&self) -> i64 {
        self.up - self.down
    }
}

/// Track currently commanded on the host's playback device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NowPlaying {
    pub track_uri: String,
    pub track_name: String,
    pub is_playing: bool,
    pub device_id: Option<String>,
    pub set_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub display_name: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Role of a connection, as reported by session lookup
///
/// Only `Host` and `Listener` are ever stored; `Anonymous` is what an
/// unknown or missing token resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Host,
    Listener,
    #[serde(rename = "none")]
    #[sqlx(rename = "none")]
    Anonymous,
}

impl Role {
    /// Any role that may enqueue, vote and chat
    pub fn is_participant(&self) -> bool {
        !matches!(self, Role::Anonymous)
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Host => "host",
            Role::Listener => "listener",
            Role::Anonymous => "none",
        };
        f.write_str(name)
    }
}

/// A joined participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub role: Role,
    /// Provider account id (hosts only)
    pub user_id: Option<String>,
    pub display_name: String,
    /// Listener slot; released when the listener leaves
    pub listener_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}
