//! Per-request correlation identifiers.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Request ID header, inbound and outbound.
pub const X_REQUEST_ID: &str = "x-request-id";

/// W3C trace context header.
pub const TRACEPARENT: &str = "traceparent";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Identifier set for one inbound request.
///
/// Built once at the boundary, then shared read-only (behind an `Arc`) with
/// every concurrent outbound call and log emission of that request.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationContext {
    request_id: String,
    trace_id: Option<String>,
    span_id: Option<String>,
    started_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
}

impl CorrelationContext {
    /// Context with the given request ID and no trace identifiers.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            trace_id: None,
            span_id: None,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Context with a fresh UUIDv4 request ID and fresh trace identifiers.
    pub fn generate() -> Self {
        let (trace_id, span_id) = generate_trace_ids();
        Self::new(Uuid::new_v4().to_string()).with_trace(trace_id, span_id)
    }

    /// Attach distributed-trace identifiers.
    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    /// Build from inbound headers, honouring a well-formed `X-Request-ID` and
    /// `traceparent`, generating whatever is missing or malformed.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| is_valid_request_id(id))
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (trace_id, span_id) = headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_traceparent)
            .unwrap_or_else(generate_trace_ids);

        Self::new(request_id).with_trace(trace_id, span_id)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// W3C `traceparent` value, if both trace identifiers are present.
    pub fn traceparent(&self) -> Option<String> {
        match (&self.trace_id, &self.span_id) {
            (Some(trace), Some(span)) => Some(format!("00-{}-{}-01", trace, span)),
            _ => None,
        }
    }

    /// Correlation headers attached to every outbound attempt.
    pub fn outbound_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            headers.insert(X_REQUEST_ID, value);
        }
        if let Some(value) = self.traceparent().and_then(|tp| HeaderValue::from_str(&tp).ok()) {
            headers.insert(TRACEPARENT, value);
        }
        headers
    }
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}

fn generate_trace_ids() -> (String, String) {
    let trace_id = Uuid::new_v4().simple().to_string();
    let span_id = format!("{:016x}", rand::random::<u64>().max(1));
    (trace_id, span_id)
}

/// Parse `version-traceid-parentid-flags`, returning (trace_id, span_id).
pub fn parse_traceparent(value: &str) -> Option<(String, String)> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let flags = parts.next()?;

    if version.len() != 2 || !is_lower_hex(version) || version == "ff" {
        return None;
    }
    if version == "00" && parts.next().is_some() {
        return None;
    }
    if trace_id.len() != 32 || !is_lower_hex(trace_id) || trace_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if span_id.len() != 16 || !is_lower_hex(span_id) || span_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if flags.len() != 2 || !is_lower_hex(flags) {
        return None;
    }

    Some((trace_id.to_string(), span_id.to_string()))
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
