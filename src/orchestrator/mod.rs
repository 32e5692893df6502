//! Orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! ProcessRequest
//!     → service.rs (render one CallRequest per configured dependency)
//!     → fanout.rs (spawn all calls, fan-in barrier, optional request deadline)
//!     → result.rs (one slot per call, partial_failure, processing_time)
//!     → service.rs (combine into ProcessResponse)
//! ```
//!
//! # Design Decisions
//! - Total latency ≈ slowest call, not the sum
//! - Non-required failures degrade the response (null payload), required ones fail it
//! - Merge is commutative: completion order never changes the result

pub mod fanout;
pub mod result;
pub mod service;

pub use fanout::{CallRequest, OrchestrationError, Orchestrator, RequiredFailure};
pub use result::{AggregatedResult, ResultBuilder};
pub use service::{BusinessService, ProcessRequest, ProcessResponse};
