//! Consecutive run-level failure bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-collection failure counter kept in the checkpoint store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureState {
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// An alert was sent for the current streak
    #[serde(default)]
    pub alerted: bool,
}

impl FailureState {
    /// Counts a failure and returns true if this one should fire the alert
    ///
    /// The alert fires only when the counter reaches `threshold` exactly, so a
    /// streak alerts once no matter how long it gets.
    pub fn record(&mut self, error: impl Into<String>, now: DateTime<Utc>, threshold: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
        self.last_failure_at = Some(now);

        if !self.alerted && self.consecutive_failures == threshold {
            self.alerted = true;
            return true;
        }
        false
    }

    /// Clears the streak
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        self.consecutive_failures == 0
    }
}
