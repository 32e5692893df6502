//! Correlation subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → tracer.rs (build CorrelationContext from X-Request-ID / traceparent, open span)
//!     → handler receives Arc<CorrelationContext>
//!     → orchestrator clones the Arc into every concurrent call
//!     → client attaches correlation.rs headers to every attempt
//!     → tracer.rs logs completion and echoes X-Request-ID
//! ```
//!
//! # Design Decisions
//! - Context is immutable after construction; sharing is by `Arc`, never by copy-and-mutate
//! - Inbound identifiers are honoured when well-formed, regenerated otherwise
//! - Spans carry the request ID so every log line inside the request is attributable

pub mod correlation;
pub mod tracer;

pub use correlation::{CorrelationContext, TRACEPARENT, X_REQUEST_ID};
pub use tracer::{trace_requests, RequestTrace, TracePhase};
