//! HTTP API: route groups, request/response bodies and the SSE stream

pub mod chat;
pub mod extract;
pub mod health;
pub mod playback;
pub mod queue;
pub mod session;
pub mod sse;
