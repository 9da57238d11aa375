//! Retry policy for remote calls.

use crate::config::HttpConfig;
use std::time::Duration;

/// Exponential backoff with a hard attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_attempts: http.max_attempts.max(1),
            base_delay: Duration::from_millis(http.base_delay_ms),
            max_delay: Duration::from_millis(http.max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Wait before the next attempt. A server hint wins over the computed
    /// backoff and is honoured exactly, even above `max_delay`.
    pub fn delay_for(&self, retry: u32, server_hint: Option<Duration>) -> Duration {
        server_hint.unwrap_or_else(|| self.backoff(retry))
    }
}
