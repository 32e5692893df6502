//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → context::trace_requests (correlation context, request span)
//!     → handlers.rs (extract, delegate to BusinessService)
//!     → errors::ErrorTranslator on failure
//!     → Send to client (X-Request-ID always set)
//! ```

pub mod handlers;
pub mod server;

pub use handlers::HealthResponse;
pub use server::{build_router, AppState, HttpServer};
