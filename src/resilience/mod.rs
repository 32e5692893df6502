//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound attempt:
//!     → per-attempt timeout (enforced by client::outbound with tokio::time::timeout)
//!     → On failure: retries.rs (check if retryable, pick delay)
//!     → backoff.rs (fixed or exponential delay, optional jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for transient failure classes
//! - Retry state is per call invocation

pub mod backoff;
pub mod retries;

pub use backoff::BackoffPolicy;
pub use retries::{is_retryable, RetryPolicy, RetryState};
