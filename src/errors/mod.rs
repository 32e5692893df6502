//! Error translation subsystem.
//!
//! # Data Flow
//! ```text
//! handler failure (validation, orchestration escalation, internal)
//!     → translator.rs classify → (FailureClass, PublicError)
//!     → full detail to the structured log
//!     → ErrorResponse (status + JSON body + X-Request-ID)
//! ```

pub mod translator;

pub use translator::{ErrorResponse, ErrorTranslator, FailureClass, PublicError, ServiceError};
