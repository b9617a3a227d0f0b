//! Event types for the BeatSync broadcast channel
//!
//! Every mutation that other participants must see is published as a
//! [`BeatSyncEvent`] and delivered to each connected client over SSE. The
//! serialized form is a JSON object tagged by `type`, and the SSE event name
//! is [`BeatSyncEvent::event_type`].

use crate::db::{ChatMessage, NowPlaying, QueueEntry, VoteCounts, VoteType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One queue entry with its aggregated votes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshotEntry {
    #[serde(flatten)]
    pub entry: QueueEntry,
    pub up_votes: i64,
    pub down_votes: i64,
    pub net_score: i64,
}

impl QueueSnapshotEntry {
    pub fn new(entry: QueueEntry, counts: VoteCounts) -> Self {
        Self {
            entry,
            up_votes: counts.up,
            down_votes: counts.down,
            net_score: counts.net_score(),
        }
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts::new(self.up_votes, self.down_votes)
    }
}

/// Queue plus vote state, in FIFO order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueSnapshotEntry>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn find(&self, track_uri: &str) -> Option<&QueueSnapshotEntry> {
        self.entries.iter().find(|e| e.entry.track_uri == track_uri)
    }
}

/// Why a track left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Started by auto-play or an explicit play command
    Played,
    /// Removed by the host
    Removed,
    /// Removed by reconciliation because it was already playing
    Reconciled,
}

/// BeatSync event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BeatSyncEvent {
    /// Full state for a newly connected (or lagged) client
    InitialState {
        snapshot: QueueSnapshot,
        now_playing: Option<NowPlaying>,
        timestamp: DateTime<Utc>,
    },

    /// A track was enqueued
    QueueUpdated {
        /// The entry that was added
        entry: QueueEntry,
        snapshot: QueueSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// A vote was recorded
    VoteUpdated {
        track_uri: String,
        vote_type: VoteType,
        /// Display name of the voter
        voter: String,
        up_votes: i64,
        down_votes: i64,
        net_score: i64,
        /// Echo of the client's correlation id, when one was sent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_vote_id: Option<String>,
        snapshot: QueueSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// A track left the queue together with its votes
    TrackRemoved {
        track_uri: String,
        reason: RemovalReason,
        timestamp: DateTime<Utc>,
    },

    PlaybackStarted {
        track_uri: String,
        track_name: String,
        device_id: Option<String>,
        is_playing: bool,
        timestamp: DateTime<Utc>,
    },

    /// Playback paused, or stopped entirely when `track_uri` is None
    PlaybackPaused {
        track_uri: Option<String>,
        track_name: Option<String>,
        timestamp: DateTime<Utc>,
    },

    ChatMessage {
        message: ChatMessage,
        timestamp: DateTime<Utc>,
    },

    /// Host cleared the whole queue
    QueueCleared {
        items_removed: u64,
        timestamp: DateTime<Utc>,
    },

    /// Host restarted the session: queue, votes, chat and playback are gone
    SessionRestarted { timestamp: DateTime<Utc> },
}

impl BeatSyncEvent {
    /// SSE event name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            BeatSyncEvent::InitialState { .. } => "initial_state",
            BeatSyncEvent::QueueUpdated { .. } => "queue_updated",
            BeatSyncEvent::VoteUpdated { .. } => "vote_updated",
            BeatSyncEvent::TrackRemoved { .. } => "track_removed",
            BeatSyncEvent::PlaybackStarted { .. } => "playback_started",
            BeatSyncEvent::PlaybackPaused { .. } => "playback_paused",
            BeatSyncEvent::ChatMessage { .. } => "chat_message",
            BeatSyncEvent::QueueCleared { .. } => "queue_cleared",
            BeatSyncEvent::SessionRestarted { .. } => "session_restarted",
        }
    }

    pub fn playback_started(now_playing: &NowPlaying) -> Self {
        BeatSyncEvent::PlaybackStarted {
            track_uri: now_playing.track_uri.clone(),
            track_name: now_playing.track_name.clone(),
            device_id: now_playing.device_id.clone(),
            is_playing: now_playing.is_playing,
            timestamp: Utc::now(),
        }
    }

    pub fn track_removed(track_uri: &str, reason: RemovalReason) -> Self {
        BeatSyncEvent::TrackRemoved {
            track_uri: track_uri.to_string(),
            reason,
            timestamp: Utc::now(),
        }
    }
}
