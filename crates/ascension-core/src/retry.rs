//! Bounded exponential backoff for transient failures

use std::time::Duration;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// How many times a transiently failing item is re-pushed, and how long it waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Overrides [`backoff_duration`] when set (tests, impatient runs)
    pub fixed_delay: Option<Duration>,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            fixed_delay: None,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        Some(self.fixed_delay.unwrap_or_else(|| backoff_duration(attempt)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
