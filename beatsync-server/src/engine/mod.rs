//! Coordination engine
//!
//! **Module Structure:**
//! - `core.rs`: Engine state, construction, shared helpers
//! - `queue.rs`: Queue Store and Vote Ledger operations, host queue administration
//! - `autoplay.rs`: Auto-Play Coordinator
//! - `playback.rs`: Explicit play / resume / pause
//! - `sessions.rs`: Role lookup, joining and leaving
//! - `chat.rs`: Chat messages and cached history

mod autoplay;
mod chat;
mod core;
mod playback;
mod queue;
mod sessions;

pub use self::autoplay::PlaybackResult;
pub use self::core::{Engine, EngineConfig};
pub use self::queue::VoteOutcome;
pub use self::sessions::{Caller, HostStatus};

/// Longest chat message accepted, in characters
pub const MAX_CHAT_MESSAGE_CHARS: usize = 500;
