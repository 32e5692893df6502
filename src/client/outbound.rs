//! Outbound HTTP client for one external dependency.
//!
//! # Responsibilities
//! - Apply base address, default headers and correlation headers
//! - Enforce the per-attempt timeout
//! - Retry transient failures with backoff
//! - Classify every failure into a `CallOutcome`; nothing is returned as `Err`

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::Instrument;
use url::Url;

use crate::client::outcome::{CallOutcome, ErrorKind};
use crate::client::template::CallParams;
use crate::config::validation::{parse_base_url, ValidationError};
use crate::config::UpstreamConfig;
use crate::context::CorrelationContext;
use crate::observability::metrics;
use crate::resilience::{BackoffPolicy, RetryPolicy};

const DETAIL_BODY_LIMIT: usize = 256;

/// Static description of one outbound dependency, shared read-only by every request.
#[derive(Debug, Clone)]
pub struct OutboundCallSpec {
    /// Call name, used as the result slot key.
    pub name: String,
    /// Base address.
    pub target: Url,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay policy between attempts.
    pub retry_backoff: BackoffPolicy,
    /// Whether a failure of this call fails the whole request.
    pub required: bool,
    /// Headers sent on every attempt.
    pub default_headers: HeaderMap,
}

impl OutboundCallSpec {
    /// Spec with a 30s timeout, no retries, not required.
    pub fn new(name: impl Into<String>, target: Url) -> Self {
        Self {
            name: name.into(),
            target,
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_backoff: BackoffPolicy::default(),
            required: false,
            default_headers: HeaderMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: BackoffPolicy) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Build from validated upstream configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ValidationError> {
        let target = parse_base_url(&config.base_url).map_err(|reason| ValidationError::BaseUrl {
            name: config.name.clone(),
            url: config.base_url.clone(),
            reason,
        })?;

        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let header_error = || ValidationError::Header {
                name: config.name.clone(),
                header: key.clone(),
            };
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| header_error())?;
            let value = HeaderValue::from_str(value).map_err(|_| header_error())?;
            default_headers.insert(name, value);
        }

        Ok(Self {
            name: config.name.clone(),
            target,
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            retry_backoff: BackoffPolicy::from(&config.backoff),
            required: config.required,
            default_headers,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_backoff)
    }

    /// Join a request path onto the base address, keeping any base path prefix.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.target.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
    }
}

/// One failed attempt, before the retry decision.
#[derive(Debug)]
struct AttemptFailure {
    kind: ErrorKind,
    detail: String,
    status: Option<StatusCode>,
}

impl AttemptFailure {
    fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            status: None,
        }
    }

    fn into_outcome(self) -> CallOutcome {
        match self.kind {
            ErrorKind::Timeout => CallOutcome::TimedOut,
            kind => CallOutcome::failed(kind, self.detail),
        }
    }
}

/// Client wrapping one external dependency.
///
/// Cloning is cheap: the `OutboundCallSpec` is shared and `reqwest::Client` is a handle to a
/// pooled connection set shared by every request.
#[derive(Debug, Clone)]
pub struct OutboundClient {
    spec: Arc<OutboundCallSpec>,
    http: reqwest::Client,
}

impl OutboundClient {
    pub fn new(spec: OutboundCallSpec, http: reqwest::Client) -> Self {
        Self {
            spec: Arc::new(spec),
            http,
        }
    }

    pub fn spec(&self) -> &OutboundCallSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Issue the call, retrying transient failures, and settle it into an outcome.
    pub async fn call(
        &self,
        ctx: &CorrelationContext,
        method: Method,
        path: &str,
        params: Option<&CallParams>,
    ) -> CallOutcome {
        let started = Instant::now();

        let outcome = match self.spec.url_for(path) {
            Ok(url) => self.call_with_retries(ctx, &method, &url, params).await,
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    call = %self.spec.name,
                    path = %path,
                    error = %e,
                    "Cannot build outbound url"
                );
                CallOutcome::failed(ErrorKind::Connection, format!("invalid url: {}", e))
            }
        };

        metrics::record_call_outcome(&self.spec.name, outcome.label(), started.elapsed());
        outcome
    }

    async fn call_with_retries(
        &self,
        ctx: &CorrelationContext,
        method: &Method,
        url: &Url,
        params: Option<&CallParams>,
    ) -> CallOutcome {
        let mut retry = self.spec.retry_policy().start();

        loop {
            let attempt = retry.begin_attempt();
            let span = tracing::info_span!(
                "outbound_attempt",
                request_id = %ctx.request_id(),
                call = %self.spec.name,
                attempt,
                method = %method,
                outcome = tracing::field::Empty,
            );
            let attempt_started = Instant::now();
            let result = self
                .attempt(ctx, method, url, params)
                .instrument(span.clone())
                .await;
            let elapsed_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;

            let failure = match result {
                Ok(payload) => {
                    span.record("outcome", "success");
                    span.in_scope(|| {
                        tracing::info!(outcome = "success", elapsed_ms, "Outbound attempt");
                    });
                    metrics::record_attempt(&self.spec.name, "success");
                    return CallOutcome::success(payload);
                }
                Err(failure) => failure,
            };

            span.record("outcome", failure.kind.as_str());
            metrics::record_attempt(&self.spec.name, failure.kind.as_str());

            match retry.next_delay(failure.kind) {
                Some(delay) => {
                    span.in_scope(|| {
                        tracing::warn!(
                            outcome = failure.kind.as_str(),
                            status = failure.status.map(|s| s.as_u16()),
                            detail = %failure.detail,
                            elapsed_ms,
                            retry_in_ms = delay.as_millis() as u64,
                            "Outbound attempt"
                        );
                    });
                    tokio::time::sleep(delay).await;
                }
                None => {
                    span.in_scope(|| {
                        tracing::warn!(
                            outcome = failure.kind.as_str(),
                            status = failure.status.map(|s| s.as_u16()),
                            detail = %failure.detail,
                            elapsed_ms,
                            attempts = retry.attempt(),
                            "Outbound attempt"
                        );
                    });
                    return failure.into_outcome();
                }
            }
        }
    }

    async fn attempt(
        &self,
        ctx: &CorrelationContext,
        method: &Method,
        url: &Url,
        params: Option<&CallParams>,
    ) -> Result<Value, AttemptFailure> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(self.spec.default_headers.clone())
            .headers(ctx.outbound_headers());

        if let Some(params) = params {
            if !params.query.is_empty() {
                request = request.query(&params.query);
            }
            if let Some(body) = &params.body {
                request = request.json(body);
            }
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.spec.timeout, exchange).await {
            Ok(Ok(exchanged)) => exchanged,
            Ok(Err(e)) => return Err(AttemptFailure::new(ErrorKind::from_transport(&e), e.to_string())),
            Err(_) => {
                return Err(AttemptFailure::new(
                    ErrorKind::Timeout,
                    format!("no response within {}ms", self.spec.timeout.as_millis()),
                ))
            }
        };

        if let Some(kind) = ErrorKind::from_status(status) {
            let snippet = String::from_utf8_lossy(&body[..body.len().min(DETAIL_BODY_LIMIT)]).into_owned();
            return Err(AttemptFailure {
                kind,
                detail: format!("status {}: {}", status, snippet),
                status: Some(status),
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body)
            .map_err(|e| AttemptFailure::new(ErrorKind::Decode, format!("invalid json body: {}", e)))
    }
}
