//! # BeatSync Common Library
//!
//! Shared code for the BeatSync services:
//! - Domain models (queue entries, votes, now playing, chat, roles)
//! - Event types broadcast to connected clients
//! - Configuration loading and root folder resolution
//! - Database initialization
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
