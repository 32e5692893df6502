//! Translation of internal failures into the public error shape.
//!
//! # Responsibilities
//! - Map every failure to a closed classification and HTTP status
//! - Produce a stable code and message for callers
//! - Log the full internal detail, which never reaches the public shape
//!
//! # Design Decisions
//! - Public codes never mention dependency names, error kinds or retry counts
//! - A required dependency rejecting our request (`http_4xx`) maps to the
//!   configured class; every other dependency failure is `upstream_unavailable`

use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ErrorKind;
use crate::config::ClientErrorClass;
use crate::context::{CorrelationContext, X_REQUEST_ID};
use crate::orchestrator::OrchestrationError;

/// Any failure that can end an inbound request.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The inbound payload was rejected before orchestration.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    /// The inbound request did not complete within the configured request timeout.
    #[error("request did not complete within {0:?}")]
    Deadline(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Closed public classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Validation,
    UpstreamUnavailable,
    Internal,
}

impl FailureClass {
    pub fn status_code(self) -> StatusCode {
        match self {
            FailureClass::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            FailureClass::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            FailureClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            FailureClass::Validation => "invalid_request",
            FailureClass::UpstreamUnavailable => "upstream_unavailable",
            FailureClass::Internal => "internal_error",
        }
    }

    fn message(self) -> &'static str {
        match self {
            FailureClass::Validation => "The request could not be processed as submitted",
            FailureClass::UpstreamUnavailable => "A required dependency is currently unavailable",
            FailureClass::Internal => "Something went wrong",
        }
    }
}

/// Public error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicError {
    pub error: String,
    pub message: String,
    pub request_id: String,
}

/// Ready-to-send error response.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub class: FailureClass,
    pub body: PublicError,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let request_id = HeaderValue::from_str(&self.body.request_id).ok();
        let mut response = (self.class.status_code(), Json(self.body)).into_response();
        if let Some(value) = request_id {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}

/// Sole place where internal failures become user-visible errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator {
    client_error: ClientErrorClass,
}

impl ErrorTranslator {
    pub fn new(client_error: ClientErrorClass) -> Self {
        Self { client_error }
    }

    /// Classify a failure. Pure: no logging, no context.
    pub fn classify(&self, failure: &ServiceError) -> FailureClass {
        match failure {
            ServiceError::Validation(_) => FailureClass::Validation,
            ServiceError::Internal(_) => FailureClass::Internal,
            ServiceError::Deadline(_) => FailureClass::UpstreamUnavailable,
            ServiceError::Orchestration(err) => match err {
                OrchestrationError::UnknownCall(_) | OrchestrationError::DuplicateCall(_) => {
                    FailureClass::Internal
                }
                OrchestrationError::RequiredCallFailed { .. } => {
                    let all_rejections = err
                        .failure_kinds()
                        .into_iter()
                        .all(|kind| kind == ErrorKind::Http4xx);
                    match (all_rejections, self.client_error) {
                        (true, ClientErrorClass::Validation) => FailureClass::Validation,
                        _ => FailureClass::UpstreamUnavailable,
                    }
                }
            },
        }
    }

    /// Map a failure to its classification and public shape.
    pub fn translate(&self, ctx: &CorrelationContext, failure: &ServiceError) -> (FailureClass, PublicError) {
        let class = self.classify(failure);
        let body = PublicError {
            error: class.code().to_string(),
            message: class.message().to_string(),
            request_id: ctx.request_id().to_string(),
        };
        (class, body)
    }

    /// Translate, log the internal detail, and build the response.
    pub fn respond(&self, ctx: &CorrelationContext, failure: &ServiceError) -> ErrorResponse {
        let (class, body) = self.translate(ctx, failure);

        match failure {
            ServiceError::Orchestration(OrchestrationError::RequiredCallFailed { failures, result }) => {
                let detail: Vec<String> = result
                    .failed_calls()
                    .map(|(name, outcome)| format!("{}: {:?}", name, outcome))
                    .collect();
                tracing::error!(
                    request_id = %ctx.request_id(),
                    class = class.code(),
                    required = ?failures,
                    detail = ?detail,
                    "Request escalated"
                );
            }
            ServiceError::Validation(reason) => {
                tracing::warn!(request_id = %ctx.request_id(), reason = %reason, "Request rejected");
            }
            other => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    class = class.code(),
                    error = %other,
                    "Request aborted"
                );
            }
        }

        ErrorResponse { class, body }
    }
}
