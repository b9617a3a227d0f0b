//! Auto-Play Coordinator
//!
//! Advances playback to the selected track and removes exactly that track
//! from the queue. One trigger runs at a time system-wide:
//! - the in-process flight gate is taken with `try_lock`, never waited on
//! - the debounce stamp in `autoplay_gate` is claimed by compare-and-set, so
//!   the window also holds across processes sharing the database
//!
//! Correctness comes from the transactional re-check of the selected entry,
//! not from the debounce.

use super::core::Engine;
use super::sessions::Caller;
use crate::cache::SnapshotCache;
use crate::db::{gate, now_playing, queue, votes};
use crate::error::{Error, ErrorKind, Result};
use crate::selector::{select_next, TrackChoice};
use beatsync_common::db::NowPlaying;
use beatsync_common::events::{BeatSyncEvent, RemovalReason};
use beatsync_common::time::now_millis;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Outcome of a successful auto-play
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackResult {
    pub track: TrackChoice,
    pub now_playing: NowPlaying,
    pub votes_purged: u64,
}

impl Engine {
    /// Pick the next track, start it, and remove it from the queue.
    ///
    /// Errors: `TooSoon` (another trigger in flight or inside the debounce
    /// window), `QueueEmpty`, `PlaybackFailed` (queue untouched) and
    /// `Mismatch` (playback started but the entry changed underneath).
    pub async fn trigger_autoplay(
        &self,
        caller: &Caller,
        device_id: Option<String>,
    ) -> Result<PlaybackResult> {
        caller.require_host()?;

        // Released on every exit path, including storage failures
        let _flight = self.autoplay_flight.try_lock().map_err(|_| {
            debug!("Auto-play rejected: another trigger in flight");
            Error::TooSoon
        })?;

        let window_ms = self.config.autoplay_debounce.as_millis() as i64;
        let claim = {
            let mut conn = self.db.acquire().await?;
            gate::try_claim(&mut conn, now_millis(), window_ms).await?
        };
        let Some(claim) = claim else {
            debug!("Auto-play rejected: inside {} ms debounce window", window_ms);
            return Err(Error::TooSoon);
        };

        let result = self.run_autoplay(device_id).await;

        if let Err(e) = &result {
            if e.kind() == ErrorKind::Storage {
                // Storage failure must not hold the debounce window closed
                match self.db.acquire().await {
                    Ok(mut conn) => {
                        if let Err(release_err) = gate::release(&mut conn, claim).await {
                            warn!("Failed to release auto-play gate: {}", release_err);
                        }
                    }
                    Err(acquire_err) => warn!("Failed to release auto-play gate: {}", acquire_err),
                }
            }
        }

        result
    }

    /// Storage errors from here leave nothing committed: every fallible step
    /// runs before the commit, and only cache stores and publishes follow it.
    async fn run_autoplay(&self, device_id: Option<String>) -> Result<PlaybackResult> {
        let choice = self.select_from_store().await?.ok_or(Error::QueueEmpty)?;
        debug!(
            "Auto-play selected {} (net score {})",
            choice.track_uri, choice.net_score
        );

        let uri = choice.track_uri.clone();
        self.call_provider("start playback", self.playback.start_playback(&uri, device_id.as_deref()))
            .await?;

        // Playback has started; from here the operation runs to completion
        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;

        let playing = NowPlaying {
            track_uri: choice.track_uri.clone(),
            track_name: choice.track_name.clone(),
            is_playing: true,
            device_id,
            set_at: Utc::now(),
        };

        match queue::find(&mut *tx, &choice.track_uri).await? {
            Some(entry) if entry.id == choice.entry_id => {}
            current => {
                if let Err(e) = tx.rollback().await {
                    warn!("Auto-play rollback failed: {}", e);
                }
                error!(
                    "Auto-play mismatch for {}: entry {} was {} after playback started",
                    choice.track_uri,
                    choice.entry_id,
                    match current {
                        Some(_) => "replaced",
                        None => "removed",
                    }
                );

                // The device is playing it regardless; record that so a
                // reconcile can find any entry left behind
                if let Err(e) = self.record_playing(&playing).await {
                    warn!("Failed to record {} as now playing: {}", playing.track_uri, e);
                }

                return Err(Error::Mismatch(choice.track_uri));
            }
        }

        queue::remove(&mut *tx, &choice.track_uri).await?;
        let votes_purged = votes::purge_votes(&mut *tx, &choice.track_uri).await?;
        now_playing::set(&mut *tx, &playing).await?;
        let staged_queue = SnapshotCache::stage_snapshot(&mut tx).await?;
        let staged_playing = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.store_snapshot(&staged_queue).await;
        self.snapshot.store_now_playing(&staged_playing).await;

        self.hub.publish(BeatSyncEvent::track_removed(
            &choice.track_uri,
            RemovalReason::Played,
        ));
        self.hub.publish(BeatSyncEvent::playback_started(&playing));

        info!(
            "Auto-play started {} ({}), {} votes purged",
            playing.track_uri, playing.track_name, votes_purged
        );

        Ok(PlaybackResult {
            track: choice,
            now_playing: playing,
            votes_purged,
        })
    }

    async fn record_playing(&self, playing: &NowPlaying) -> Result<()> {
        let mut tx = self.db.begin().await?;
        now_playing::set(&mut *tx, playing).await?;
        let staged = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;

        self.snapshot.store_now_playing(&staged).await;
        self.hub.publish(BeatSyncEvent::playback_started(playing));
        Ok(())
    }

    /// Run the selector over the Queue Store and Vote Ledger (not the cache)
    async fn select_from_store(&self) -> Result<Option<TrackChoice>> {
        let mut tx = self.db.begin().await?;
        let entries = queue::list(&mut *tx).await?;
        let counts = votes::counts_all(&mut *tx).await?;
        tx.commit().await?;

        Ok(select_next(&entries, |entry| {
            counts.get(&entry.track_uri).copied().unwrap_or_default()
        }))
    }
}
