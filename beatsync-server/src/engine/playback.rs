//! Explicit playback control (host only)

use super::core::Engine;
use super::sessions::Caller;
use crate::cache::SnapshotCache;
use crate::db::{now_playing, queue, votes};
use crate::error::{Error, Result};
use beatsync_common::db::NowPlaying;
use beatsync_common::events::{BeatSyncEvent, RemovalReason};
use chrono::Utc;
use tracing::info;

impl Engine {
    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        self.snapshot.now_playing().await
    }

    /// Start a specific track.
    ///
    /// If the track is queued it leaves the queue in the same transaction that
    /// records it as now playing.
    pub async fn play(
        &self,
        caller: &Caller,
        track_uri: &str,
        track_name: Option<&str>,
        device_id: Option<String>,
    ) -> Result<NowPlaying> {
        caller.require_host()?;
        let track_uri = track_uri.trim();
        if track_uri.is_empty() {
            return Err(Error::Validation("track_uri is required".to_string()));
        }

        self.call_provider("start playback", self.playback.start_playback(track_uri, device_id.as_deref()))
            .await?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let removed = queue::remove(&mut *tx, track_uri).await?;
        if removed.is_some() {
            votes::purge_votes(&mut *tx, track_uri).await?;
        }

        let track_name = track_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| removed.as_ref().map(|e| e.track_name.clone()))
            .unwrap_or_else(|| track_uri.to_string());

        let playing = NowPlaying {
            track_uri: track_uri.to_string(),
            track_name,
            is_playing: true,
            device_id,
            set_at: Utc::now(),
        };
        now_playing::set(&mut *tx, &playing).await?;
        let staged_queue = match removed {
            Some(_) => Some(SnapshotCache::stage_snapshot(&mut tx).await?),
            None => None,
        };
        let staged_playing = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;

        if let Some(staged) = &staged_queue {
            self.snapshot.store_snapshot(staged).await;
        }
        self.snapshot.store_now_playing(&staged_playing).await;

        if removed.is_some() {
            self.hub
                .publish(BeatSyncEvent::track_removed(track_uri, RemovalReason::Played));
        }
        self.hub.publish(BeatSyncEvent::playback_started(&playing));

        info!("Playing {} ({})", playing.track_uri, playing.track_name);
        Ok(playing)
    }

    /// Resume the current track; `NotFound` when nothing is set
    pub async fn resume(&self, caller: &Caller, device_id: Option<String>) -> Result<NowPlaying> {
        caller.require_host()?;
        if self.snapshot.now_playing().await?.is_none() {
            return Err(Error::NotFound("nothing to resume".to_string()));
        }

        self.call_provider("resume", self.playback.resume_playback(device_id.as_deref()))
            .await?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let playing = now_playing::set_is_playing(&mut *tx, true, device_id.as_deref())
            .await?
            .ok_or_else(|| Error::NotFound("nothing to resume".to_string()))?;
        let staged = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;
        self.snapshot.store_now_playing(&staged).await;

        self.hub.publish(BeatSyncEvent::playback_started(&playing));

        info!("Resumed {}", playing.track_uri);
        Ok(playing)
    }

    /// Pause the host's device. Returns the paused track, if one was set.
    pub async fn pause(&self, caller: &Caller, device_id: Option<String>) -> Result<Option<NowPlaying>> {
        caller.require_host()?;

        self.call_provider("pause", self.playback.pause_playback(device_id.as_deref()))
            .await?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        let paused = now_playing::set_is_playing(&mut *tx, false, device_id.as_deref()).await?;
        let staged = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;
        self.snapshot.store_now_playing(&staged).await;

        self.hub.publish(BeatSyncEvent::PlaybackPaused {
            track_uri: paused.as_ref().map(|p| p.track_uri.clone()),
            track_name: paused.as_ref().map(|p| p.track_name.clone()),
            timestamp: Utc::now(),
        });

        info!(
            "Paused {}",
            paused.as_ref().map(|p| p.track_uri.as_str()).unwrap_or("(nothing playing)")
        );
        Ok(paused)
    }
}
