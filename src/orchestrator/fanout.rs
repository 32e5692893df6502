//! Concurrent fan-out to outbound clients with a fan-in barrier.
//!
//! # Responsibilities
//! - Launch every requested call as its own task
//! - Wait for all of them to settle (success, failure or timeout)
//! - Enforce the optional request-wide deadline
//! - Merge outcomes and escalate failures of required calls
//!
//! # Design Decisions
//! - Tasks live in a `JoinSet`: dropping `process` (client disconnect, outer
//!   timeout) aborts every in-flight call, while one call settling never
//!   affects its siblings
//! - Each task returns its own `(name, outcome)`; only the barrier writes
//!   into the result, so no state is shared between calls
//! - Any required failure escalates, regardless of what else failed

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

use crate::client::{CallOutcome, CallParams, ErrorKind, OutboundClient, RenderedCall};
use crate::context::CorrelationContext;
use crate::orchestrator::result::{AggregatedResult, ResultBuilder};

/// One call to issue for the current request.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Name of a configured outbound client.
    pub name: String,
    pub method: Method,
    pub path: String,
    pub params: Option<CallParams>,
}

impl CallRequest {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: CallParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Request from a rendered template.
    pub fn rendered(name: impl Into<String>, call: RenderedCall) -> Self {
        Self {
            name: name.into(),
            method: call.method,
            path: call.path,
            params: Some(call.params),
        }
    }
}

/// A required call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFailure {
    pub call: String,
    pub kind: ErrorKind,
}

/// Reasons the orchestrator cannot produce a (possibly degraded) result.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// No outbound client is configured under this name.
    #[error("unknown call '{0}'")]
    UnknownCall(String),

    /// The same call was requested twice for one invocation.
    #[error("call '{0}' requested more than once")]
    DuplicateCall(String),

    /// At least one required call failed or timed out.
    #[error("required call(s) failed: {}", describe(.failures))]
    RequiredCallFailed {
        failures: Vec<RequiredFailure>,
        result: Box<AggregatedResult>,
    },
}

fn describe(failures: &[RequiredFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.call, f.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

impl OrchestrationError {
    /// Kinds of the required failures, if this is an escalation.
    pub fn failure_kinds(&self) -> Vec<ErrorKind> {
        match self {
            OrchestrationError::RequiredCallFailed { failures, .. } => {
                failures.iter().map(|f| f.kind).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Issues outbound calls concurrently and merges their outcomes.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    clients: BTreeMap<String, OutboundClient>,
    request_deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(clients: impl IntoIterator<Item = OutboundClient>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.name().to_string(), c))
                .collect(),
            request_deadline: None,
        }
    }

    /// Deadline for the whole barrier; unsettled calls become `TimedOut`.
    pub fn with_request_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn client(&self, name: &str) -> Option<&OutboundClient> {
        self.clients.get(name)
    }

    pub fn client_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Fan out `requested`, wait for every call to settle, and merge.
    pub async fn process(
        &self,
        ctx: &Arc<CorrelationContext>,
        input: &str,
        requested: Vec<CallRequest>,
    ) -> Result<AggregatedResult, OrchestrationError> {
        let mut seen = HashSet::new();
        for request in &requested {
            if !self.clients.contains_key(&request.name) {
                return Err(OrchestrationError::UnknownCall(request.name.clone()));
            }
            if !seen.insert(request.name.as_str()) {
                return Err(OrchestrationError::DuplicateCall(request.name.clone()));
            }
        }

        let span = tracing::info_span!(
            "orchestrate",
            request_id = %ctx.request_id(),
            calls = requested.len(),
        );

        self.fan_out(ctx, input, requested).instrument(span).await
    }

    async fn fan_out(
        &self,
        ctx: &Arc<CorrelationContext>,
        input: &str,
        requested: Vec<CallRequest>,
    ) -> Result<AggregatedResult, OrchestrationError> {
        let started = Instant::now();
        let deadline = self.request_deadline.map(|d| started + d);

        tracing::info!(
            input_len = input.len(),
            calls = ?requested.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "Starting fan-out"
        );

        let mut builder = ResultBuilder::new(requested.iter().map(|r| r.name.clone()));
        let mut tasks = JoinSet::new();

        for request in requested {
            let Some(client) = self.clients.get(&request.name).cloned() else {
                continue;
            };
            let ctx = Arc::clone(ctx);
            tasks.spawn(
                async move {
                    let call = client.call(&ctx, request.method, &request.path, request.params.as_ref());
                    let outcome = match deadline {
                        Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                            Ok(outcome) => outcome,
                            Err(_) => {
                                tracing::warn!(call = %request.name, "Call cut off by request deadline");
                                CallOutcome::TimedOut
                            }
                        },
                        None => call.await,
                    };
                    (request.name, outcome)
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    tracing::debug!(call = %name, outcome = outcome.label(), "Call settled");
                    builder.record(name, outcome);
                }
                Err(e) => tracing::error!(error = %e, "Call task terminated before settling"),
            }
        }

        let result = builder.finish(started.elapsed(), |_| {
            CallOutcome::failed(ErrorKind::Connection, "call task terminated before settling")
        });

        let failures: Vec<RequiredFailure> = result
            .failed_calls()
            .filter(|(name, _)| self.clients.get(*name).is_some_and(|c| c.spec().required))
            .filter_map(|(name, outcome)| {
                outcome.error_kind().map(|kind| RequiredFailure {
                    call: name.to_string(),
                    kind,
                })
            })
            .collect();

        tracing::info!(
            processing_time_ms = result.processing_time().as_secs_f64() * 1000.0,
            partial_failure = result.partial_failure(),
            failed = result.failed_calls().count(),
            required_failed = failures.len(),
            "Fan-out completed"
        );

        if failures.is_empty() {
            Ok(result)
        } else {
            Err(OrchestrationError::RequiredCallFailed {
                failures,
                result: Box::new(result),
            })
        }
    }
}
