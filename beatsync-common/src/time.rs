//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `earlier` (negative if `earlier` is in the future)
pub fn millis_since(earlier: DateTime<Utc>) -> i64 {
    (Utc::now() - earlier).num_milliseconds()
}
