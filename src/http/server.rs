//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (correlation tracing, CORS, body limits)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{CorsConfig, ServiceConfig, ServiceInfo};
use crate::context::{trace_requests, X_REQUEST_ID};
use crate::errors::ErrorTranslator;
use crate::http::handlers;
use crate::lifecycle::shutdown;
use crate::lifecycle::startup::{build_state, StartupError};
use crate::orchestrator::BusinessService;

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<BusinessService>,
    pub translator: ErrorTranslator,
    pub info: Arc<ServiceInfo>,
    /// Budget for one inbound request, enforced by the handlers.
    pub request_timeout: Duration,
}

/// HTTP server for the fan-out service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, StartupError> {
        let state = build_state(&config)?;
        Ok(Self::with_state(config, state))
    }

    /// Create a server around an already wired state.
    pub fn with_state(config: ServiceConfig, state: AppState) -> Self {
        let router = build_router(&config, state);
        Self { router, config }
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown_rx` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            environment = %self.config.service.environment,
            upstreams = self.config.upstreams.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
///
/// The correlation middleware is outermost so that every response,
/// including CORS preflights and body-limit rejections, carries `X-Request-ID`.
/// Timeouts and oversized bodies are handled inside the handlers so that they
/// reach the caller through the error translator.
pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/process", post(handlers::process))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
        .layer(cors_layer(&config.cors))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_requests))
}

/// CORS with any method and request header; origins from configuration.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
}
