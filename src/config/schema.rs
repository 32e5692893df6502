//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the fan-out service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service identity (health check, outbound user-agent).
    pub service: ServiceInfo,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Inbound timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Fan-out barrier settings.
    pub orchestration: OrchestrationConfig,

    /// External dependencies called for every inbound request.
    pub upstreams: Vec<UpstreamConfig>,

    /// Public error mapping.
    pub errors: ErrorMappingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Cross-origin access to the inbound API.
    pub cors: CorsConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceInfo {
    /// Human readable service name.
    pub name: String,

    /// Reported version.
    pub version: String,

    /// Deployment environment label (e.g., "dev", "prod").
    pub environment: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "fanout-service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "dev".to_string(),
        }
    }
}

impl ServiceInfo {
    /// Value sent as `user-agent` on outbound calls.
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum accepted inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard ceiling on the whole inbound request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Fan-out barrier configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Request-wide deadline in milliseconds. Calls still unsettled when it
    /// fires are recorded as timed out.
    pub request_deadline_ms: Option<u64>,
}

/// One external HTTP dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique call name, used as the result slot key.
    pub name: String,

    /// Base address (e.g., "http://service-a.internal:8080").
    pub base_url: String,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether a failure of this call fails the whole request.
    #[serde(default)]
    pub required: bool,

    /// Static headers sent on every attempt.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Delay policy between attempts.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Request issued for every inbound call.
    #[serde(default)]
    pub request: CallTemplate,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles per retry up to `max_delay_ms`.
    #[default]
    Exponential,
}

/// Backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Fixed or exponential.
    pub strategy: BackoffStrategy,

    /// First retry delay in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// Outbound request template. `{input}` is replaced with the inbound input.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallTemplate {
    /// HTTP method.
    pub method: String,

    /// Path appended to the base address.
    pub path: String,

    /// Query parameters.
    pub query: BTreeMap<String, String>,

    /// JSON body; `{input}` is substituted in every string value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Default for CallTemplate {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            query: BTreeMap::new(),
            body: None,
        }
    }
}

/// Public classification of a dependency rejecting our request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorClass {
    /// Treat the rejection as the caller's fault.
    Validation,
    /// Treat the rejection as the dependency being unusable.
    #[default]
    UpstreamUnavailable,
}

/// Error mapping configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ErrorMappingConfig {
    /// Classification of a required call ending in `http_4xx`.
    pub client_error: ClientErrorClass,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// CORS configuration. Methods and request headers are always unrestricted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin, an empty list allows none.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}
