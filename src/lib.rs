//! Concurrent fan-out HTTP service library.

pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod resilience;

pub use config::schema::ServiceConfig;
pub use context::CorrelationContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use orchestrator::{AggregatedResult, BusinessService, Orchestrator};
