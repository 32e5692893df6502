//! Request tracer: creates the correlation context at the boundary and scopes
//! every log line of the request to it.
//!
//! # Lifecycle
//! ```text
//! Created   → context built from inbound headers, span opened
//! Active    → context handed to the handler; all work runs inside the span
//! Finalized → completion logged, X-Request-ID set on the response, context dropped
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Span};

use crate::context::correlation::{CorrelationContext, X_REQUEST_ID};
use crate::observability::metrics;

/// Phase of a request's correlation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePhase {
    Created,
    Active,
    Finalized,
}

/// Owns the correlation context of one inbound request for its lifetime.
#[derive(Debug)]
pub struct RequestTrace {
    context: Arc<CorrelationContext>,
    span: Span,
    phase: TracePhase,
    method: Method,
    path: String,
}

impl RequestTrace {
    /// Create the context for an inbound request.
    pub fn begin(context: CorrelationContext, method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let span = tracing::info_span!(
            "request",
            request_id = %context.request_id(),
            trace_id = context.trace_id().unwrap_or_default(),
            span_id = context.span_id().unwrap_or_default(),
            method = %method,
            path = %path,
        );
        Self {
            context: Arc::new(context),
            span,
            phase: TracePhase::Created,
            method,
            path,
        }
    }

    pub fn phase(&self) -> TracePhase {
        self.phase
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn context(&self) -> &Arc<CorrelationContext> {
        &self.context
    }

    /// Mark the context active and hand out a shared handle to it.
    pub fn activate(&mut self) -> Arc<CorrelationContext> {
        debug_assert_eq!(self.phase, TracePhase::Created);
        self.phase = TracePhase::Active;
        self.span.in_scope(|| {
            tracing::info!(
                method = %self.method,
                path = %self.path,
                started_at = %self.context.started_at().to_rfc3339(),
                "Request started"
            );
        });
        self.context.clone()
    }

    /// Log completion, tag the response, and release the context.
    pub fn finalize(mut self, response: &mut Response) -> TracePhase {
        self.phase = TracePhase::Finalized;
        let status = response.status();
        let duration = self.context.elapsed();

        if let Ok(value) = HeaderValue::from_str(self.context.request_id()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        self.span.in_scope(|| {
            if status.is_server_error() {
                tracing::warn!(
                    status_code = status.as_u16(),
                    duration_ms = duration.as_secs_f64() * 1000.0,
                    "Request failed"
                );
            } else {
                tracing::info!(
                    status_code = status.as_u16(),
                    duration_ms = duration.as_secs_f64() * 1000.0,
                    "Request completed"
                );
            }
        });

        metrics::record_request(self.method.as_str(), status.as_u16(), duration);
        self.phase
    }
}

/// Middleware installing a [`RequestTrace`] around every inbound request.
///
/// The context is exposed to handlers as `Extension<Arc<CorrelationContext>>`.
pub async fn trace_requests(mut request: Request<Body>, next: Next) -> Response {
    let context = CorrelationContext::from_headers(request.headers());
    let mut trace = RequestTrace::begin(context, request.method().clone(), request.uri().path());
    let span = trace.span().clone();

    let context = trace.activate();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).instrument(span).await;
    trace.finalize(&mut response);
    response
}
