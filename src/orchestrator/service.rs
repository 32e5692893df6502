//! Business service: turns one inbound request into a fan-out and combines
//! the results into the response document.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{is_dot_segment, render};
use crate::config::CallTemplate;
use crate::context::CorrelationContext;
use crate::errors::ServiceError;
use crate::orchestrator::fanout::{CallRequest, Orchestrator};
use crate::orchestrator::result::AggregatedResult;

/// Inbound payload of `POST /process`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub input_data: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Response document of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessResponse {
    pub request_id: String,
    pub processed_data: String,
    /// Payload per dependency; null when that dependency failed.
    pub sources: BTreeMap<String, Option<Value>>,
    pub partial_failure: bool,
    pub processing_time_ms: f64,
}

/// Renders the configured call templates for each input and combines the results.
#[derive(Debug, Clone)]
pub struct BusinessService {
    orchestrator: Orchestrator,
    templates: Vec<(String, CallTemplate)>,
}

impl BusinessService {
    /// `templates` pairs each outbound client name with the request issued per input.
    pub fn new(orchestrator: Orchestrator, templates: Vec<(String, CallTemplate)>) -> Self {
        Self {
            orchestrator,
            templates,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Calls issued for `input`.
    pub fn plan(&self, input: &str) -> Vec<CallRequest> {
        self.templates
            .iter()
            .map(|(name, template)| CallRequest::rendered(name.clone(), render(template, input)))
            .collect()
    }

    pub async fn process_data(
        &self,
        ctx: &Arc<CorrelationContext>,
        request: &ProcessRequest,
    ) -> Result<ProcessResponse, ServiceError> {
        if is_dot_segment(&request.input_data) {
            return Err(ServiceError::Validation(format!(
                "input_data '{}' is not a valid identifier",
                request.input_data
            )));
        }

        tracing::info!(
            input_data = %request.input_data,
            options = ?request.options,
            "Starting data processing"
        );

        let result = self
            .orchestrator
            .process(ctx, &request.input_data, self.plan(&request.input_data))
            .await?;

        let response = combine(ctx, request, &result);

        tracing::info!(
            processing_time_ms = response.processing_time_ms,
            partial_failure = response.partial_failure,
            "Data processing completed"
        );

        Ok(response)
    }
}

fn combine(ctx: &CorrelationContext, request: &ProcessRequest, result: &AggregatedResult) -> ProcessResponse {
    let sources = result.payloads();
    let combined = json!({
        "input": request.input_data,
        "options": request.options,
        "enriched": sources,
        "processed_at": Utc::now().to_rfc3339(),
    });

    ProcessResponse {
        request_id: ctx.request_id().to_string(),
        processed_data: format!("Processed: {} characters of data", combined.to_string().len()),
        sources,
        partial_failure: result.partial_failure(),
        processing_time_ms: result.processing_time().as_secs_f64() * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{OutboundCallSpec, OutboundClient};
    use reqwest::Method;
    use url::Url;

    #[test]
    fn test_plan_renders_every_template() {
        let http = reqwest::Client::new();
        let clients = ["a", "b"].map(|name| {
            OutboundClient::new(
                OutboundCallSpec::new(name, Url::parse("http://127.0.0.1:9").unwrap()),
                http.clone(),
            )
        });
        let mut query = BTreeMap::new();
        query.insert("query".to_string(), "{input}".to_string());
        let templates = vec![
            (
                "a".to_string(),
                CallTemplate {
                    method: "GET".into(),
                    path: "/api/data".into(),
                    query,
                    body: None,
                },
            ),
            (
                "b".to_string(),
                CallTemplate {
                    method: "POST".into(),
                    path: "/api/items/{input}/metadata".into(),
                    query: BTreeMap::new(),
                    body: Some(serde_json::json!({"id": "{input}"})),
                },
            ),
        ];

        let service = BusinessService::new(Orchestrator::new(clients), templates);
        let plan = service.plan("item 7");

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].name, "a");
        assert_eq!(plan[0].path, "/api/data");
        assert_eq!(
            plan[0].params.as_ref().unwrap().query,
            vec![("query".to_string(), "item 7".to_string())]
        );
        assert_eq!(plan[1].method, Method::POST);
        assert_eq!(plan[1].path, "/api/items/item%207/metadata");
        assert_eq!(
            plan[1].params.as_ref().unwrap().body,
            Some(serde_json::json!({"id": "item 7"}))
        );
    }

    #[tokio::test]
    async fn test_dot_segment_input_rejected_before_fan_out() {
        let http = reqwest::Client::new();
        let client = OutboundClient::new(
            OutboundCallSpec::new("a", Url::parse("http://127.0.0.1:9").unwrap()),
            http,
        );
        let template = CallTemplate {
            path: "/api/items/{input}/metadata".into(),
            ..CallTemplate::default()
        };
        let service = BusinessService::new(Orchestrator::new([client]), vec![("a".to_string(), template)]);
        let ctx = Arc::new(CorrelationContext::new("r"));

        for input in [".", ".."] {
            let request = ProcessRequest {
                input_data: input.to_string(),
                options: BTreeMap::new(),
            };
            let err = service.process_data(&ctx, &request).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{input}: {err}");
        }
    }

    #[test]
    fn test_request_options_default_empty() {
        let request: ProcessRequest = serde_json::from_str(r#"{"input_data": "x"}"#).unwrap();
        assert!(request.options.is_empty());
        assert!(serde_json::from_str::<ProcessRequest>(r#"{"options": {}}"#).is_err());
    }
}
