//! Role lookup, joining and leaving

use super::core::Engine;
use crate::cache::SnapshotCache;
use crate::db::{now_playing, sessions};
use crate::error::{Error, Result};
use beatsync_common::db::{Role, Session};
use beatsync_common::events::BeatSyncEvent;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// The participant behind a request
#[derive(Debug, Clone, Default)]
pub struct Caller {
    session: Option<Session>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn role(&self) -> Role {
        self.session
            .as_ref()
            .map(|s| s.role)
            .unwrap_or(Role::Anonymous)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.display_name.as_str())
    }

    /// Any joined participant (host or listener)
    pub fn require_participant(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::Unauthorized)
    }

    pub fn require_host(&self) -> Result<&Session> {
        let session = self.require_participant()?;
        if session.role.is_host() {
            Ok(session)
        } else {
            Err(Error::Forbidden("host role required".to_string()))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub present: bool,
    pub display_name: Option<String>,
}

impl Engine {
    /// Resolve a session token to a caller; unknown tokens are anonymous
    pub async fn authorize(&self, token: Option<&str>) -> Result<Caller> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(Caller::anonymous());
        };

        Ok(sessions::find(&self.db, token)
            .await?
            .map(Caller::from_session)
            .unwrap_or_default())
    }

    /// Join as the single host; `HostTaken` if another host is present
    pub async fn join_as_host(
        &self,
        user_id: Option<String>,
        display_name: &str,
        access_token: Option<String>,
    ) -> Result<Session> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::Validation("display_name must not be empty".to_string()));
        }

        let token = Uuid::new_v4().to_string();
        let session =
            sessions::insert_host(&self.db, &token, user_id.as_deref(), display_name).await?;
        self.credentials.set(access_token).await;

        info!("Host joined: {}", session.display_name);
        Ok(session)
    }

    /// Join as a listener named after the smallest free listener number
    pub async fn join_as_listener(&self) -> Result<Session> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.db.acquire().await?;
        let session = sessions::insert_listener(&mut conn, &token).await?;

        info!("Listener joined: {}", session.display_name);
        Ok(session)
    }

    /// End the caller's session. A leaving host is signed out.
    pub async fn leave(&self, caller: &Caller) -> Result<()> {
        let session = caller.require_participant()?;
        if session.role.is_host() {
            return self.sign_out_host(caller).await;
        }

        sessions::delete(&self.db, &session.token).await?;
        info!("Listener left: {}", session.display_name);
        Ok(())
    }

    /// Remove the host, drop provider credentials and clear now-playing
    pub async fn sign_out_host(&self, caller: &Caller) -> Result<()> {
        let session = caller.require_host()?;

        let _seq = self.sequencer.lock().await;
        let mut tx = self.db.begin().await?;
        sessions::delete(&mut *tx, &session.token).await?;
        now_playing::clear(&mut *tx).await?;
        let staged = SnapshotCache::stage_now_playing(&mut tx).await?;
        tx.commit().await?;

        self.credentials.clear().await;
        self.snapshot.store_now_playing(&staged).await;

        self.hub.publish(BeatSyncEvent::PlaybackPaused {
            track_uri: None,
            track_name: None,
            timestamp: Utc::now(),
        });

        info!("Host signed out: {}", session.display_name);
        Ok(())
    }

    pub async fn host_status(&self) -> Result<HostStatus> {
        let host = sessions::host(&self.db).await?;
        Ok(HostStatus {
            present: host.is_some(),
            display_name: host.map(|h| h.display_name),
        })
    }
}
