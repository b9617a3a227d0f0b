//! Broadcast Hub
//!
//! Fans out [`BeatSyncEvent`]s to every connected client. Each client holds a
//! [`Subscription`]; dropping it unsubscribes. Events published by one task
//! reach every subscriber in publish order.

use beatsync_common::events::BeatSyncEvent;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

/// A registered client connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: u64,
    /// Display name of the subscriber
    pub label: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

type Registry = Arc<Mutex<HashMap<u64, ConnectionInfo>>>;

#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<BeatSyncEvent>,
    capacity: usize,
    next_id: Arc<AtomicU64>,
    connections: Registry,
}

impl BroadcastHub {
    /// Creates a hub buffering up to `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity,
            next_id: Arc::new(AtomicU64::new(1)),
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a connection and receive every event published from now on
    pub fn subscribe(&self, label: impl Into<String>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = ConnectionInfo {
            id,
            label: label.into(),
            connected_at: chrono::Utc::now(),
        };
        debug!("Connection {} subscribed ({})", id, info.label);

        if let Ok(mut connections) = self.connections.lock() {
            connections.insert(id, info);
        }

        Subscription {
            id,
            receiver: self.tx.subscribe(),
            guard: RegistrationGuard {
                id,
                connections: Arc::clone(&self.connections),
            },
        }
    }

    /// Unsubscribe explicitly (equivalent to dropping the handle)
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: BeatSyncEvent) -> usize {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!("Published {} to {} subscribers", event_type, receivers);
                receivers
            }
            Err(_) => {
                trace!("Published {} with no subscribers", event_type);
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let mut list: Vec<ConnectionInfo> = self
            .connections
            .lock()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by_key(|c| c.id);
        list
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A connection's handle on the hub
pub struct Subscription {
    id: u64,
    receiver: broadcast::Receiver<BeatSyncEvent>,
    guard: RegistrationGuard,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event. `Lagged` means this subscriber fell behind and missed events.
    pub async fn recv(&mut self) -> Result<BeatSyncEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Convert into a stream; the connection stays registered while the
    /// stream is alive
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = Result<BeatSyncEvent, BroadcastStreamRecvError>> + Send + 'static {
        let guard = self.guard;
        BroadcastStream::new(self.receiver).map(move |item| {
            let _registered = &guard;
            item
        })
    }
}

struct RegistrationGuard {
    id: u64,
    connections: Registry,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.remove(&self.id);
        }
        debug!("Connection {} unsubscribed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatsync_common::events::RemovalReason;
    use chrono::Utc;

    fn removed(uri: &str) -> BeatSyncEvent {
        BeatSyncEvent::track_removed(uri, RemovalReason::Removed)
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let hub = BroadcastHub::new(16);
        let mut a = hub.subscribe("Listener 1");
        let mut b = hub.subscribe("Listener 2");

        assert_eq!(hub.publish(removed("t1")), 2);
        hub.publish(BeatSyncEvent::SessionRestarted { timestamp: Utc::now() });

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await.unwrap().event_type(), "track_removed");
            assert_eq!(sub.recv().await.unwrap().event_type(), "session_restarted");
        }
    }

    #[tokio::test]
    async fn test_no_replay_of_events_before_subscribe() {
        let hub = BroadcastHub::new(16);
        assert_eq!(hub.publish(removed("early")), 0);

        let mut sub = hub.subscribe("late");
        hub.publish(removed("later"));

        match sub.recv().await.unwrap() {
            BeatSyncEvent::TrackRemoved { track_uri, .. } => assert_eq!(track_uri, "later"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = BroadcastHub::new(16);
        let a = hub.subscribe("a");
        let b = hub.subscribe("b");
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.connections().len(), 2);

        hub.unsubscribe(a);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.connections()[0].label, "b");

        let stream = b.into_stream();
        assert_eq!(hub.connections().len(), 1);
        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(hub.connections().is_empty());
    }

    #[tokio::test]
    async fn test_slow_subscriber_sees_lagged() {
        let hub = BroadcastHub::new(2);
        let mut sub = hub.subscribe("slow");

        for i in 0..5 {
            hub.publish(removed(&format!("t{}", i)));
        }

        assert!(matches!(
            sub.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
