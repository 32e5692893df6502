//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator
//!     → template.rs (render configured path/query for this input)
//!     → outbound.rs (attempt → classify → retry with backoff)
//!     → outcome.rs (CallOutcome: Success / Failed(kind) / TimedOut)
//! ```
//!
//! # Design Decisions
//! - One `reqwest::Client` (connection pool) shared by all upstreams and requests
//! - Timeout applies per attempt, not to the retry sequence
//! - Failures are values, never `Err`, so the caller reasons over a closed set

pub mod outbound;
pub mod outcome;
pub mod template;

pub use outbound::{OutboundCallSpec, OutboundClient};
pub use outcome::{CallOutcome, ErrorKind};
pub use template::{is_dot_segment, render, CallParams, RenderedCall};
