//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → consumed once by lifecycle::startup to build the object graph
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Invalid configuration is the only fatal error class

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackoffConfig, BackoffStrategy, CallTemplate, ClientErrorClass, CorsConfig, ErrorMappingConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, OrchestrationConfig, ServiceConfig,
    ServiceInfo, TimeoutConfig, UpstreamConfig,
};
