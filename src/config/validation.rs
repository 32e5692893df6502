//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream addresses, names and value ranges
//! - Validate listener and metrics addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ServiceConfig, UpstreamConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("request deadline must be greater than zero")]
    ZeroRequestDeadline,

    #[error("upstream #{0} has an empty name")]
    EmptyUpstreamName(usize),

    #[error("duplicate upstream name '{0}'")]
    DuplicateUpstream(String),

    #[error("upstream '{name}': invalid base url '{url}': {reason}")]
    BaseUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("upstream '{0}': timeout must be greater than zero")]
    ZeroTimeout(String),

    #[error("upstream '{name}': invalid method '{method}'")]
    Method { name: String, method: String },

    #[error("upstream '{name}': path '{path}' must start with '/'")]
    Path { name: String, path: String },

    #[error("upstream '{name}': invalid header '{header}'")]
    Header { name: String, header: String },

    #[error("upstream '{0}': backoff base delay exceeds max delay")]
    BackoffRange(String),

    #[error("invalid CORS origin '{0}'")]
    CorsOrigin(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.orchestration.request_deadline_ms == Some(0) {
        errors.push(ValidationError::ZeroRequestDeadline);
    }

    for origin in &config.cors.allowed_origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }

    let mut seen = HashSet::new();
    for (idx, upstream) in config.upstreams.iter().enumerate() {
        if upstream.name.trim().is_empty() {
            errors.push(ValidationError::EmptyUpstreamName(idx));
        } else if !seen.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }
        validate_upstream(upstream, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_upstream(upstream: &UpstreamConfig, errors: &mut Vec<ValidationError>) {
    let name = upstream.name.clone();

    if let Err(reason) = parse_base_url(&upstream.base_url) {
        errors.push(ValidationError::BaseUrl {
            name: name.clone(),
            url: upstream.base_url.clone(),
            reason,
        });
    }

    if upstream.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout(name.clone()));
    }

    if Method::from_bytes(upstream.request.method.as_bytes()).is_err() {
        errors.push(ValidationError::Method {
            name: name.clone(),
            method: upstream.request.method.clone(),
        });
    }

    if !upstream.request.path.starts_with('/') {
        errors.push(ValidationError::Path {
            name: name.clone(),
            path: upstream.request.path.clone(),
        });
    }

    for (key, value) in &upstream.headers {
        if HeaderName::from_bytes(key.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::Header {
                name: name.clone(),
                header: key.clone(),
            });
        }
    }

    if upstream.backoff.base_delay_ms > upstream.backoff.max_delay_ms {
        errors.push(ValidationError::BackoffRange(name));
    }
}

/// Parse an upstream base address, accepting only absolute http(s) URLs.
pub fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("query and fragment are not allowed".to_string());
    }
    Ok(url)
}
