//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Time elapsed between two instants, zero if `later` is not after `earlier`
pub fn elapsed_between(earlier: Instant, later: Instant) -> Duration {
    later.saturating_duration_since(earlier)
}
