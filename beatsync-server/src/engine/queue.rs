//! Queue and vote operations
//!
//! Every mutation stages the new snapshot in its transaction, commits, stores
//! the snapshot and publishes its event while holding the sequencer, so
//! subscribers see events in commit order. Nothing after a commit can fail.

use super::core::Engine;
use super::sessions::Caller;
use crate::cache::SnapshotCache;
use crate::db::{chat, now_playing, queue, votes};
use crate::error::{Error, Result};
use crate::selector::{select_next, TrackChoice};
use beatsync_common::db::{QueueEntry, Vote, VoteCounts, VoteType};
use beatsync_common::events::{BeatSyncEvent, QueueSnapshot, RemovalReason};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

/// A recorded vote with the track's counts after it
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub vote: Vote,
    pub up_votes: i64,
    pub down_votes: i64,
    pub net_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_vote_id: Option<String>,
}

fn require_field(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Validation(format!("{} is required", name)))
    } else {
        Ok(())
    }
}

impl Engine {
    /// Current queue with vote counts (served from the snapshot cache)
    pub async fn get_queue(&self) -> Result<QueueSnapshot> {
        self.snapshot.current().await
    }

    /// The track auto-play would choose right now
    pub async fn next_track_preview(&self) -> Result<Option<TrackChoice>> {
        let snapshot = self.snapshot.current().await?;
        let entries: Vec<QueueEntry> = snapshot.entries.iter().map(|e| e.entry.clone()).collect();

        Ok(select_next(&entries, |entry| {
            snapshot
                .find(&entry.track_uri)
                .map(|e| e.counts())
                .unwrap_or_default()
        }))
    }

    pub async fn enqueue(&self, caller: &Caller, track_uri: &str, track_name: &str) -> Result<QueueEntry> {
        caller.require_participant()?;
        require_field("track_uri", track_uri)?;
        require_field("track_name", track_name)?;
        let (track_uri, track_name) = (track_uri.trim(), track_name.trim());

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        if let Some(playing) = now_playing::get(&mut *tx).await? {
            if playing.track_uri == track_uri {
                return Err(Error::CurrentlyPlaying(track_uri.to_string()));
            }
        }
        let entry = queue::enqueue(&mut *tx, track_uri, track_name).await?;
        let staged = SnapshotCache::stage_snapshot(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.store_snapshot(&staged).await;
        self.hub.publish(BeatSyncEvent::QueueUpdated {
            entry: entry.clone(),
            snapshot: staged.value,
            timestamp: Utc::now(),
        });

        info!("Enqueued {} ({}) by {}", entry.track_uri, entry.track_name, caller.display_name().unwrap_or("?"));
        Ok(entry)
    }

    /// Append a vote; `vote_type` must be "up" or "down"
    pub async fn cast_vote(
        &self,
        caller: &Caller,
        track_uri: &str,
        vote_type: &str,
        client_vote_id: Option<String>,
    ) -> Result<VoteOutcome> {
        let session = caller.require_participant()?;
        require_field("track_uri", track_uri)?;
        let vote_type: VoteType = vote_type.parse().map_err(Error::Validation)?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let vote = votes::cast_vote(&mut *tx, track_uri, vote_type, &session.token)
            .await?
            .ok_or_else(|| Error::NotFound(format!("track not in queue: {}", track_uri)))?;
        let staged = SnapshotCache::stage_snapshot(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.store_snapshot(&staged).await;
        let snapshot = staged.value;
        let counts = snapshot
            .find(track_uri)
            .map(|e| e.counts())
            .unwrap_or_default();

        self.hub.publish(BeatSyncEvent::VoteUpdated {
            track_uri: track_uri.to_string(),
            vote_type,
            voter: session.display_name.clone(),
            up_votes: counts.up,
            down_votes: counts.down,
            net_score: counts.net_score(),
            client_vote_id: client_vote_id.clone(),
            snapshot,
            timestamp: Utc::now(),
        });

        debug!("Vote {} for {} by {}", vote_type, track_uri, session.display_name);
        Ok(VoteOutcome {
            vote,
            up_votes: counts.up,
            down_votes: counts.down,
            net_score: counts.net_score(),
            client_vote_id,
        })
    }

    /// Aggregated counts for one track (zero when it has no votes)
    pub async fn counts_for(&self, track_uri: &str) -> Result<VoteCounts> {
        votes::counts_for(&self.db, track_uri).await
    }

    /// Host removes one track and its votes
    pub async fn remove_track(&self, caller: &Caller, track_uri: &str) -> Result<QueueEntry> {
        caller.require_host()?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let entry = queue::remove(&mut *tx, track_uri)
            .await?
            .ok_or_else(|| Error::NotFound(format!("track not in queue: {}", track_uri)))?;
        let purged = votes::purge_votes(&mut *tx, track_uri).await?;
        let staged = SnapshotCache::stage_snapshot(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.store_snapshot(&staged).await;
        self.hub
            .publish(BeatSyncEvent::track_removed(track_uri, RemovalReason::Removed));

        info!("Removed {} from queue ({} votes purged)", track_uri, purged);
        Ok(entry)
    }

    /// Host deletes every entry and every vote
    pub async fn clear_queue(&self, caller: &Caller) -> Result<u64> {
        caller.require_host()?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let items_removed = queue::clear(&mut *tx).await?;
        votes::purge_all(&mut *tx).await?;
        let staged = SnapshotCache::stage_snapshot(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.store_snapshot(&staged).await;
        self.hub.publish(BeatSyncEvent::QueueCleared {
            items_removed,
            timestamp: Utc::now(),
        });

        info!("Queue cleared: {} items removed", items_removed);
        Ok(items_removed)
    }

    /// Remove the queue entry for the track that is already playing, if any.
    ///
    /// Repairs the state left behind when an auto-play started playback but
    /// its removal aborted with `Mismatch`.
    pub async fn reconcile(&self, caller: &Caller) -> Result<Option<QueueEntry>> {
        caller.require_host()?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let Some(playing) = now_playing::get(&mut *tx).await? else {
            return Ok(None);
        };
        let removed = queue::remove(&mut *tx, &playing.track_uri).await?;
        if removed.is_some() {
            votes::purge_votes(&mut *tx, &playing.track_uri).await?;
        }
        let staged = SnapshotCache::stage_snapshot(&mut tx).await?;
        tx.commit().await?;

        if let Some(entry) = &removed {
            self.snapshot.store_snapshot(&staged).await;
            self.hub.publish(BeatSyncEvent::track_removed(
                &entry.track_uri,
                RemovalReason::Reconciled,
            ));
            info!("Reconciled: removed playing track {} from queue", entry.track_uri);
        }

        Ok(removed)
    }

    /// Host wipes queue, votes, chat and now-playing; sessions are kept
    pub async fn restart_session(&self, caller: &Caller) -> Result<()> {
        let host = caller.require_host()?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let items = queue::clear(&mut *tx).await?;
        votes::purge_all(&mut *tx).await?;
        chat::clear(&mut *tx).await?;
        now_playing::clear(&mut *tx).await?;
        let staged_queue = SnapshotCache::stage_snapshot(&mut tx).await?;
        let staged_playing = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.invalidate().await;
        self.invalidate_chat_history().await;
        self.snapshot.store_snapshot(&staged_queue).await;
        self.snapshot.store_now_playing(&staged_playing).await;

        self.hub.publish(BeatSyncEvent::SessionRestarted {
            timestamp: Utc::now(),
        });

        info!("Session restarted by {} ({} queue items dropped)", host.display_name, items);
        Ok(())
    }
}
