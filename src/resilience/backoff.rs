//! Fixed and exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::{BackoffConfig, BackoffStrategy};

/// Calculate exponential backoff delay with jitter.
///
/// `retry` is 1 for the delay before the first retry; 0 yields no delay.
pub fn calculate_backoff(retry: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if retry == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(retry - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    Duration::from_millis(capped_delay + jitter_ms(capped_delay, jitter))
}

// 0 to 10% of the delay
fn jitter_ms(delay_ms: u64, enabled: bool) -> u64 {
    let jitter_range = delay_ms / 10;
    if enabled && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    }
}

/// Delay policy between attempts of one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    strategy: BackoffStrategy,
    base_ms: u64,
    max_ms: u64,
    jitter: bool,
}

impl BackoffPolicy {
    /// Same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            strategy: BackoffStrategy::Fixed,
            base_ms: ms,
            max_ms: ms,
            jitter: false,
        }
    }

    /// Doubling delay starting at `base`, capped at `max`.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            jitter: false,
        }
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed if retry == 0 => Duration::ZERO,
            BackoffStrategy::Fixed => {
                let delay = self.base_ms.min(self.max_ms);
                Duration::from_millis(delay + jitter_ms(delay, self.jitter))
            }
            BackoffStrategy::Exponential => {
                calculate_backoff(retry, self.base_ms, self.max_ms, self.jitter)
            }
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            strategy: config.strategy,
            base_ms: config.base_delay_ms,
            max_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}
