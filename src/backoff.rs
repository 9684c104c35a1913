//! Reusable retry backoff policy.
//!
//! One policy object shared by every retry path in the client (status
//! poller, job-feed fallback) instead of ad-hoc counters at each call
//! site. Doubles the base interval per consecutive failure up to a
//! bounded exponent, always clamped to the ceiling, and snaps back to
//! the base interval on the first success — responsiveness over
//! smoothing.

use crate::config::defaults::RETRY_MAX_BACKOFF_EXPONENT;
use std::time::Duration;

/// Exponential backoff with a ceiling and reset-on-success.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    consecutive_failures: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            consecutive_failures: 0,
        }
    }

    /// Current delay: `base * 2^failures`, clamped to the ceiling.
    /// With zero failures this is exactly the base interval.
    pub fn current_delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return self.base;
        }
        let exponent = self.consecutive_failures.min(RETRY_MAX_BACKOFF_EXPONENT);
        let multiplier = 1u32 << exponent;
        self.base.saturating_mul(multiplier).min(self.cap)
    }

    /// Record a failure; the next delay doubles (up to the ceiling).
    pub fn on_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Record a success; the next delay snaps back to the base interval.
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True when inside a failure streak. Used to log an error once per
    /// streak instead of on every retry.
    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }
}
