//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failed attempt is retryable (transient failure classes only)
//! - Bound the number of attempts per call invocation
//! - Produce the delay before each retry
//!
//! # Design Decisions
//! - Never retry 4xx or undecodable bodies (the next attempt would fail the same way)
//! - Connection errors, timeouts and 5xx always retryable
//! - Delays never shrink between consecutive retries, even with jitter
//! - State lives in a per-invocation `RetryState`, never shared across requests

use std::time::Duration;

use crate::client::ErrorKind;
use crate::resilience::backoff::BackoffPolicy;

/// Bounded retry configuration for one outbound dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self { max_retries, backoff }
    }

    /// Total attempts allowed, first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Fresh state for one call invocation.
    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 0,
            last_delay: Duration::ZERO,
        }
    }
}

/// Whether a failure of the given class is worth another attempt.
pub fn is_retryable(kind: ErrorKind) -> bool {
    kind.is_transient()
}

/// Attempt counter and delay memory for one call invocation.
#[derive(Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    last_delay: Duration,
}

impl RetryState {
    /// Register the start of a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Current attempt number (0 before the first attempt).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` if the failure is terminal.
    pub fn next_delay(&mut self, kind: ErrorKind) -> Option<Duration> {
        if !is_retryable(kind) || self.attempt >= self.policy.max_attempts() {
            return None;
        }
        let delay = self.policy.backoff.delay_for(self.attempt).max(self.last_delay);
        self.last_delay = delay;
        Some(delay)
    }
}
