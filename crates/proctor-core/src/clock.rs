//! Countdown arithmetic and the wall-clock seam.

use std::fmt;

use chrono::{DateTime, Utc};

/// Source of wall-clock time. Injected so countdowns are testable.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Seconds left in an attempt, derived from elapsed wall-clock time.
///
/// Elapsed time is floored to whole seconds; a start timestamp in the future
/// counts as zero elapsed.
pub fn remaining_seconds(
    started_at: DateTime<Utc>,
    duration_seconds: u64,
    now: DateTime<Utc>,
) -> u64 {
    let elapsed = now.signed_duration_since(started_at).num_seconds().max(0) as u64;
    duration_seconds.saturating_sub(elapsed)
}

/// `MM:SS`, minutes not wrapped at the hour.
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
