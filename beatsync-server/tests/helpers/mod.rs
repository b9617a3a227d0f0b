//! Shared setup for beatsync-server integration tests
//!
//! Each test gets its own in-memory database, an in-process cache and a
//! scripted playback provider it can inspect or make fail.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use beatsync_server::cache::{CacheBackend, MemoryCache};
use beatsync_server::engine::{Caller, Engine, EngineConfig};
use beatsync_server::hub::BroadcastHub;
use beatsync_server::playback::{HostCredentials, ScriptedPlayback};
use beatsync_server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub playback: Arc<ScriptedPlayback>,
}

impl TestApp {
    pub fn engine(&self) -> &Engine {
        &self.state.engine
    }

    /// Send a request, returning status and parsed JSON body (Null if empty)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = test_request(method, uri, token, body);
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    pub async fn join_host(&self, name: &str) -> String {
        let (status, body) = self
            .send("POST", "/session/host", None, Some(json!({ "display_name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "host join failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn join_listener(&self) -> String {
        let (status, body) = self.send("POST", "/session/listener", None, None).await;
        assert_eq!(status, StatusCode::CREATED, "listener join failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn enqueue(&self, token: &str, uri: &str, name: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/queue",
            Some(token),
            Some(json!({ "track_uri": uri, "track_name": name })),
        )
        .await
    }

    pub async fn vote(&self, token: &str, uri: &str, vote_type: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/queue/{}/votes", uri),
            Some(token),
            Some(json!({ "vote_type": vote_type })),
        )
        .await
    }

    /// Engine-level caller for a token
    pub async fn caller(&self, token: &str) -> Caller {
        self.engine().authorize(Some(token)).await.unwrap()
    }
}

/// Fast settings: no debounce, short provider timeout
pub fn test_config() -> EngineConfig {
    EngineConfig {
        autoplay_debounce: Duration::ZERO,
        playback_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    }
}

pub async fn setup_app() -> TestApp {
    setup_app_with(test_config()).await
}

pub async fn setup_app_with(config: EngineConfig) -> TestApp {
    setup_app_with_cache(config, Arc::new(MemoryCache::new())).await
}

pub async fn setup_app_with_cache(config: EngineConfig, cache: Arc<dyn CacheBackend>) -> TestApp {
    let db = beatsync_common::db::init_memory_database()
        .await
        .expect("Should create in-memory database");
    let playback = Arc::new(ScriptedPlayback::new());

    let engine = Engine::new(
        db,
        BroadcastHub::new(64),
        cache,
        playback.clone(),
        HostCredentials::new(),
        config,
    );
    let state = AppState::new(Arc::new(engine));

    TestApp {
        router: build_router(state.clone()),
        state,
        playback,
    }
}

pub fn test_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Track URIs of the current queue, in order
pub fn queue_uris(snapshot: &Value) -> Vec<String> {
    snapshot["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["track_uri"].as_str().unwrap().to_string())
        .collect()
}
