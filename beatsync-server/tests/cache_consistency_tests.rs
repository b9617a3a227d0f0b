//! Integration tests for cached views under slow or failing cache backends

mod helpers;

use async_trait::async_trait;
use axum::http::StatusCode;
use beatsync_common::events::BeatSyncEvent;
use beatsync_server::cache::{CacheBackend, CacheError, MemoryCache};
use beatsync_server::engine::EngineConfig;
use helpers::{queue_uris, setup_app_with_cache, test_config};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Memory cache whose first write of `slow_key` stalls for `delay`
struct SlowWriteCache {
    inner: MemoryCache,
    slow_key: &'static str,
    delay: Duration,
    stalled: AtomicBool,
}

impl SlowWriteCache {
    fn new(slow_key: &'static str, delay: Duration) -> Self {
        Self {
            inner: MemoryCache::new(),
            slow_key,
            delay,
            stalled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CacheBackend for SlowWriteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        if key == self.slow_key && !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }

    fn name(&self) -> &'static str {
        "slow-write"
    }
}

/// Backend that fails every call
struct DownCache;

#[async_trait]
impl CacheBackend for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

#[tokio::test]
async fn test_late_history_write_does_not_hide_new_message() {
    let cache = Arc::new(SlowWriteCache::new("chat_history", Duration::from_millis(200)));
    let app = setup_app_with_cache(test_config(), cache).await;
    let host = app.join_host("DJ").await;
    let caller = app.caller(&host).await;

    // Reads the empty history, then stalls while caching it
    let engine = app.state.engine.clone();
    let reader = tokio::spawn(async move { engine.chat_history().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.engine().send_chat(&caller, "hello").await.unwrap();

    let first = reader.await.unwrap().unwrap();
    assert!(first.is_empty());

    // The empty history landed in the cache after the post; it must not be served
    let history = app.engine().chat_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "hello");

    let (status, body) = app.send("GET", "/chat", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cached_history_is_reused_until_next_message() {
    let app = setup_app_with_cache(test_config(), Arc::new(MemoryCache::new())).await;
    let host = app.join_host("DJ").await;
    let caller = app.caller(&host).await;

    app.engine().send_chat(&caller, "one").await.unwrap();
    let first = app.engine().chat_history().await.unwrap();
    let again = app.engine().chat_history().await.unwrap();
    assert_eq!(first, again);

    app.engine().send_chat(&caller, "two").await.unwrap();
    let messages: Vec<String> = app
        .engine()
        .chat_history()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.message)
        .collect();
    assert_eq!(messages, vec!["one", "two"]);
}

#[tokio::test]
async fn test_autoplay_completes_when_cache_backend_is_down() {
    let config = EngineConfig {
        autoplay_debounce: Duration::from_millis(2000),
        ..test_config()
    };
    let app = setup_app_with_cache(config, Arc::new(DownCache)).await;
    let host = app.join_host("DJ").await;
    app.enqueue(&host, "spotify:track:a", "A").await;
    app.enqueue(&host, "spotify:track:b", "B").await;

    let mut events = app.engine().hub().subscribe("observer");

    let (status, body) = app.send("POST", "/playback/auto-play", Some(&host), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    // Both events go out even though every cache write failed
    let removed = tokio::time::timeout(Duration::from_millis(200), events.recv())
        .await
        .unwrap()
        .unwrap();
    let started = tokio::time::timeout(Duration::from_millis(200), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(removed, BeatSyncEvent::TrackRemoved { ref track_uri, .. } if track_uri == "spotify:track:a"));
    assert!(matches!(started, BeatSyncEvent::PlaybackStarted { ref track_uri, .. } if track_uri == "spotify:track:a"));

    // A committed auto-play keeps its debounce stamp
    let (status, body) = app.send("POST", "/playback/auto-play", Some(&host), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too_soon");

    let (_, queue) = app.send("GET", "/queue", None, None).await;
    assert_eq!(queue_uris(&queue), vec!["spotify:track:b"]);
}

#[tokio::test]
async fn test_mutations_succeed_when_cache_backend_is_down() {
    let app = setup_app_with_cache(test_config(), Arc::new(DownCache)).await;
    let host = app.join_host("DJ").await;
    let listener = app.join_listener().await;

    let (status, _) = app.enqueue(&listener, "spotify:track:a", "A").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.vote(&listener, "spotify:track:a", "up").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["net_score"], 1);

    let (status, _) = app.send("POST", "/playback/pause", Some(&host), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("DELETE", "/queue/spotify:track:a", Some(&host), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, queue) = app.send("GET", "/queue", None, None).await;
    assert!(queue_uris(&queue).is_empty());
}
