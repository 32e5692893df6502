//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the whole object graph from a validated configuration
//! - Fail fast on any configuration problem
//!
//! # Design Decisions
//! - Single composition root: every component receives its collaborators
//!   through its constructor, nothing is looked up at runtime
//! - One `reqwest::Client` is shared by every outbound client
//! - Any startup error is fatal; runtime request failures never are

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::client::{OutboundCallSpec, OutboundClient};
use crate::config::validation::ValidationError;
use crate::config::{ConfigError, ServiceConfig};
use crate::errors::ErrorTranslator;
use crate::http::server::AppState;
use crate::orchestrator::{BusinessService, Orchestrator};

/// Fatal errors raised while starting the service.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("upstream configuration error: {0}")]
    Upstream(#[from] ValidationError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the shared outbound connection pool.
pub fn build_http_client(config: &ServiceConfig) -> Result<reqwest::Client, StartupError> {
    let client = reqwest::Client::builder()
        .user_agent(config.service.user_agent())
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?;
    Ok(client)
}

/// Wire clients, orchestrator, business service and translator.
pub fn build_state(config: &ServiceConfig) -> Result<AppState, StartupError> {
    let http = build_http_client(config)?;

    let mut clients = Vec::with_capacity(config.upstreams.len());
    let mut templates = Vec::with_capacity(config.upstreams.len());
    for upstream in &config.upstreams {
        let spec = OutboundCallSpec::from_config(upstream)?;
        tracing::info!(
            call = %spec.name,
            target = %spec.target,
            timeout_ms = spec.timeout.as_millis() as u64,
            max_retries = spec.max_retries,
            required = spec.required,
            "Outbound client configured"
        );
        clients.push(OutboundClient::new(spec, http.clone()));
        templates.push((upstream.name.clone(), upstream.request.clone()));
    }

    let orchestrator = Orchestrator::new(clients).with_request_deadline(
        config
            .orchestration
            .request_deadline_ms
            .map(Duration::from_millis),
    );

    Ok(AppState {
        service: Arc::new(BusinessService::new(orchestrator, templates)),
        translator: ErrorTranslator::new(config.errors.client_error),
        info: Arc::new(config.service.clone()),
        request_timeout: Duration::from_secs(config.timeouts.request_secs),
    })
}
