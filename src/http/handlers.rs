//! Request handlers.
//!
//! Handlers stay thin: extract, delegate to the business service, and hand
//! every failure to the error translator.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::context::CorrelationContext;
use crate::errors::ServiceError;
use crate::http::server::AppState;
use crate::orchestrator::ProcessRequest;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
    pub timestamp: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.info.name.clone(),
        version: state.info.version.clone(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `POST /process`: fan out to the configured dependencies and combine.
///
/// Oversized or malformed bodies and an exhausted request budget all leave
/// through the translator.
pub async fn process(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<CorrelationContext>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let failure = ServiceError::Validation(rejection.body_text());
            return state.translator.respond(&ctx, &failure).into_response();
        }
    };

    let outcome = tokio::time::timeout(
        state.request_timeout,
        state.service.process_data(&ctx, &request),
    )
    .await
    .unwrap_or(Err(ServiceError::Deadline(state.request_timeout)));

    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => state.translator.respond(&ctx, &err).into_response(),
    }
}
