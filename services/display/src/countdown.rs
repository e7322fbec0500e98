//! Local countdown derived from a session's start time and duration
//!
//! Remaining time is computed against the local clock on every tick rather
//! than pushed by the server. Brief disconnects do not stall the display, but
//! a skewed local clock shifts the countdown by the same amount.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Countdown state of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Total length in seconds
    pub duration: i64,
}

impl Countdown {
    pub fn new(session_id: Uuid, start_time: DateTime<Utc>, duration: i64) -> Self {
        Self {
            session_id,
            start_time,
            duration,
        }
    }

    /// Whole seconds left at `now`, never negative
    pub fn remaining(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = (now - self.start_time).num_seconds();
        (self.duration - elapsed).max(0)
    }

    /// Add granted seconds without resynchronising with the server
    pub fn extend(&mut self, seconds: i64) {
        self.duration += seconds.max(0);
    }
}

/// Render seconds as `MM:SS`; minutes grow past two digits when needed
pub fn format_mm_ss(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
