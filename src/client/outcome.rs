//! Outcome of one outbound call and its failure taxonomy.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Stable classification of an outbound failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network, DNS or protocol failure before a response arrived.
    Connection,
    /// No response within the attempt deadline.
    Timeout,
    /// Dependency rejected the request. Never retried.
    #[serde(rename = "http_4xx")]
    Http4xx,
    /// Dependency failed. Retried until the budget is spent.
    #[serde(rename = "http_5xx")]
    Http5xx,
    /// Response body was not valid JSON.
    Decode,
}

impl ErrorKind {
    /// Whether another attempt may succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Http5xx)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Http4xx => "http_4xx",
            ErrorKind::Http5xx => "http_5xx",
            ErrorKind::Decode => "decode",
        }
    }

    /// Classify a response status. `None` for success statuses.
    pub fn from_status(status: reqwest::StatusCode) -> Option<Self> {
        if status.is_client_error() {
            Some(ErrorKind::Http4xx)
        } else if status.is_server_error() {
            Some(ErrorKind::Http5xx)
        } else if status.is_success() {
            None
        } else {
            // 1xx/3xx left over after redirect handling are not usable payloads.
            Some(ErrorKind::Http4xx)
        }
    }

    /// Classify a transport error raised by the HTTP client.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::Decode
        } else {
            ErrorKind::Connection
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settled result of one outbound call, after all retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    /// Decoded JSON payload.
    Success { payload: Value },
    /// Terminal failure with the last observed error.
    Failed { kind: ErrorKind, detail: String },
    /// The last attempt, or the request-wide deadline, ran out of time.
    TimedOut,
}

impl CallOutcome {
    pub fn success(payload: Value) -> Self {
        CallOutcome::Success { payload }
    }

    pub fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        CallOutcome::Failed {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }

    /// Payload if the call succeeded.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            CallOutcome::Success { payload } => Some(payload),
            _ => None,
        }
    }

    /// Failure classification, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CallOutcome::Success { .. } => None,
            CallOutcome::Failed { kind, .. } => Some(*kind),
            CallOutcome::TimedOut => Some(ErrorKind::Timeout),
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Success { .. } => "success",
            CallOutcome::Failed { .. } => "failed",
            CallOutcome::TimedOut => "timed_out",
        }
    }
}
