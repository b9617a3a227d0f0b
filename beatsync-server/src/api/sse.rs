//! Server-Sent Events stream
//!
//! Each client first receives `initial_state`, then every event published by
//! the engine in commit order. A client that falls too far behind is resynced
//! with a fresh `initial_state` instead of being disconnected.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use beatsync_common::events::BeatSyncEvent;
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use crate::engine::{Caller, Engine};
use crate::error::Result;
use crate::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

async fn initial_state(engine: &Engine) -> Result<BeatSyncEvent> {
    Ok(BeatSyncEvent::InitialState {
        snapshot: engine.get_queue().await?,
        now_playing: engine.now_playing().await?,
        timestamp: Utc::now(),
    })
}

fn to_sse(event: &BeatSyncEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.event_type(), e);
            None
        }
    }
}

/// GET /events
///
/// Requires a joined participant. Browsers pass the token as `?token=`.
pub async fn event_stream(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let label = caller.require_participant()?.display_name.clone();
    let engine = Arc::clone(&state.engine);

    // Subscribe before reading state so nothing committed afterwards is missed
    let subscription = engine.hub().subscribe(label.clone());
    let first = initial_state(&engine).await?;
    info!("SSE client connected: {}", label);

    let mut events = Box::pin(subscription.into_stream());
    let stream = async_stream::stream! {
        if let Some(sse) = to_sse(&first) {
            yield Ok(sse);
        }

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    debug!("SSE {} -> {}", event.event_type(), label);
                    if let Some(sse) = to_sse(&event) {
                        yield Ok(sse);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!("SSE client {} lagged by {} events, resyncing", label, missed);
                    match initial_state(&engine).await {
                        Ok(resync) => {
                            if let Some(sse) = to_sse(&resync) {
                                yield Ok(sse);
                            }
                        }
                        Err(e) => {
                            warn!("Resync for {} failed, closing stream: {}", label, e);
                            break;
                        }
                    }
                }
            }
        }

        debug!("Event stream for {} ended", label);
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
