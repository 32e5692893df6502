//! End-to-end tests of the HTTP surface against mock dependencies.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use common::{CapturedLogs, MockBackend, Reply};
use fanout_service::config::loader::parse_config;
use fanout_service::errors::PublicError;
use fanout_service::http::{HealthResponse, HttpServer};
use fanout_service::lifecycle::Shutdown;
use fanout_service::observability::logging::json_subscriber;
use fanout_service::orchestrator::ProcessResponse;

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

fn app(a: &MockBackend, b: &MockBackend, client_error: &str) -> Router {
    let config = parse_config(&format!(
        r#"
        [errors]
        client_error = "{client_error}"

        [[upstreams]]
        name = "source_a"
        base_url = "{a}"
        timeout_ms = 1000
        max_retries = 0
        required = true

        [upstreams.request]
        path = "/api/data"

        [upstreams.request.query]
        query = "{{input}}"

        [[upstreams]]
        name = "source_b"
        base_url = "{b}"
        timeout_ms = 1000
        max_retries = 0

        [upstreams.request]
        path = "/api/items/{{input}}/metadata"
        "#,
        client_error = client_error,
        a = a.url(),
        b = b.url(),
    ))
    .unwrap();

    HttpServer::new(config).unwrap().router()
}

fn process_request() -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header("content-type", "application/json")
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(body: Value) -> Request<Body> {
    let body = body.to_string();
    process_request().body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_health() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let response = send(
        app(&a, &b, "upstream_unavailable"),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = json_body(response).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.name, "fanout-service");
    assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
}

#[tokio::test]
async fn test_process_combines_all_sources() {
    let a = MockBackend::fixed(Reply::json(r#"{"a":1}"#)).await;
    let b = MockBackend::fixed(Reply::json(r#"{"b":2}"#)).await;

    let response = send(
        app(&a, &b, "upstream_unavailable"),
        post(json!({"input_data": "hello world", "options": {"mode": "fast"}})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let header_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: ProcessResponse = json_body(response).await;

    assert_eq!(body.request_id, header_id);
    assert!(!body.partial_failure);
    assert!(body.processed_data.starts_with("Processed: "));
    assert_eq!(body.sources["source_a"], Some(json!({"a": 1})));
    assert_eq!(body.sources["source_b"], Some(json!({"b": 2})));

    let a_req = &a.requests()[0];
    assert_eq!(a_req.path, "/api/data");
    assert_eq!(a_req.query.as_deref(), Some("query=hello+world"));
    assert_eq!(b.requests()[0].path, "/api/items/hello%20world/metadata");
}

#[tokio::test]
async fn test_optional_failure_is_partial_success() {
    let a = MockBackend::fixed(Reply::json(r#"{"a":1}"#)).await;
    let b = MockBackend::fixed(Reply::status(500)).await;

    let response = send(app(&a, &b, "upstream_unavailable"), post(json!({"input_data": "x"}))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: ProcessResponse = json_body(response).await;
    assert!(body.partial_failure);
    assert_eq!(body.sources["source_a"], Some(json!({"a": 1})));
    assert_eq!(body.sources["source_b"], None);
}

#[tokio::test]
async fn test_malformed_json_is_rejected_without_upstream_calls() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let request = process_request().body(Body::from("{not json")).unwrap();
    let response = send(app(&a, &b, "upstream_unavailable"), request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let header_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: PublicError = json_body(response).await;
    assert_eq!(body.error, "invalid_request");
    assert_eq!(body.request_id, header_id);
    assert_eq!(a.hits() + b.hits(), 0);
}

#[tokio::test]
async fn test_missing_input_data_is_rejected() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let response = send(app(&a, &b, "upstream_unavailable"), post(json!({"options": {}}))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_required_rejection_maps_to_validation_when_configured() {
    let a = MockBackend::fixed(Reply::status(400)).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let response = send(app(&a, &b, "validation"), post(json!({"input_data": "x"}))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("source_a"), "{}", text);
    assert!(!text.contains("http_4xx"), "{}", text);
    let body: PublicError = serde_json::from_str(&text).unwrap();
    assert_eq!(body.error, "invalid_request");
}

#[tokio::test]
async fn test_required_rejection_defaults_to_upstream_unavailable() {
    let a = MockBackend::fixed(Reply::status(400)).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let response = send(app(&a, &b, "upstream_unavailable"), post(json!({"input_data": "x"}))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: PublicError = json_body(response).await;
    assert_eq!(body.error, "upstream_unavailable");
}

#[tokio::test]
async fn test_required_server_error_is_upstream_unavailable() {
    let a = MockBackend::fixed(Reply::status(503)).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let response = send(app(&a, &b, "validation"), post(json!({"input_data": "x"}))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("source_a"), "{}", text);
    assert!(!text.contains("http_5xx"), "{}", text);
    assert!(!text.contains("status 503"), "{}", text);
}

#[tokio::test]
async fn test_inbound_correlation_is_honoured_and_propagated() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let request = process_request()
        .header("x-request-id", "client-req-42")
        .header("traceparent", TRACEPARENT)
        .body(Body::from(json!({"input_data": "x"}).to_string()))
        .unwrap();
    let response = send(app(&a, &b, "upstream_unavailable"), request).await;

    assert_eq!(response.headers()["x-request-id"], "client-req-42");
    let body: ProcessResponse = json_body(response).await;
    assert_eq!(body.request_id, "client-req-42");

    for recorded in a.requests().into_iter().chain(b.requests()) {
        assert_eq!(recorded.headers["x-request-id"], "client-req-42");
        let traceparent = recorded.headers["traceparent"].to_str().unwrap();
        assert!(traceparent.starts_with("00-4bf92f3577b34da6a3ce929d0e0e4736-"));
    }
}

#[tokio::test]
async fn test_oversized_request_id_is_replaced() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;
    let oversized = "r".repeat(200);

    let request = process_request()
        .header("x-request-id", oversized.as_str())
        .body(Body::from(json!({"input_data": "x"}).to_string()))
        .unwrap();
    let response = send(app(&a, &b, "upstream_unavailable"), request).await;

    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_ne!(id, oversized);
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(a.requests()[0].headers["x-request-id"], id.as_str());
}

#[tokio::test]
async fn test_every_log_line_carries_the_request_id() {
    let a = MockBackend::fixed(Reply::status(503)).await;
    let b = MockBackend::fixed(Reply::status(404)).await;
    let app = app(&a, &b, "upstream_unavailable");

    let logs = CapturedLogs::default();
    let _guard = tracing::subscriber::set_default(json_subscriber(logs.clone(), "fanout_service=info"));

    let request = process_request()
        .header("x-request-id", "log-check-7")
        .body(Body::from(json!({"input_data": "x"}).to_string()))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let lines = logs.lines();
    assert!(lines.iter().any(|l| l.contains("Request started")));
    assert!(lines.iter().any(|l| l.contains("Outbound attempt")));
    assert_eq!(lines.iter().filter(|l| l.contains("Request failed")).count(), 1);
    assert_eq!(lines.iter().filter(|l| l.contains("Request escalated")).count(), 1);
    for line in &lines {
        let parsed: Value = serde_json::from_str(line).unwrap();
        assert!(line.contains("log-check-7"), "missing request id: {}", parsed);
    }
}

fn single_upstream_app(upstream: &MockBackend, extra: &str) -> Router {
    let config = parse_config(&format!(
        r#"
        {extra}

        [[upstreams]]
        name = "source_a"
        base_url = "{url}"
        timeout_ms = 5000
        max_retries = 0
        required = true
        "#,
        extra = extra,
        url = upstream.url(),
    ))
    .unwrap();

    HttpServer::new(config).unwrap().router()
}

#[tokio::test]
async fn test_dot_segment_input_never_reaches_upstreams() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    for input in ["..", "."] {
        let response = send(app(&a, &b, "upstream_unavailable"), post(json!({"input_data": input}))).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "input {:?}", input);
        let body: PublicError = json_body(response).await;
        assert_eq!(body.error, "invalid_request");
    }
    assert_eq!(a.hits() + b.hits(), 0);
}

#[tokio::test]
async fn test_request_budget_exhaustion_is_translated() {
    let a = MockBackend::fixed(Reply::json("{}").after(Duration::from_secs(3))).await;
    let app = single_upstream_app(&a, "[timeouts]\nrequest_secs = 1");

    let started = std::time::Instant::now();
    let response = send(app, post(json!({"input_data": "x"}))).await;

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let header_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: PublicError = json_body(response).await;
    assert_eq!(body.error, "upstream_unavailable");
    assert_eq!(body.request_id, header_id);
}

#[tokio::test]
async fn test_oversized_body_is_invalid_request() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let app = single_upstream_app(&a, "[listener]\nmax_body_bytes = 64");

    let response = send(app, post(json!({"input_data": "x".repeat(256)}))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.headers().contains_key("x-request-id"));
    let body: PublicError = json_body(response).await;
    assert_eq!(body.error, "invalid_request");
    assert_eq!(a.hits(), 0);
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri("/process")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin_by_default() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let b = MockBackend::fixed(Reply::json("{}")).await;

    let response = send(app(&a, &b, "upstream_unavailable"), preflight("https://ui.example.com")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(response.headers().contains_key("access-control-allow-methods"));
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(a.hits() + b.hits(), 0);
}

#[tokio::test]
async fn test_cors_origin_list_is_enforced() {
    let a = MockBackend::fixed(Reply::json("{}")).await;
    let app = single_upstream_app(&a, "[cors]\nallowed_origins = [\"https://ui.example.com\"]");

    let allowed = send(app.clone(), preflight("https://ui.example.com")).await;
    assert_eq!(allowed.headers()["access-control-allow-origin"], "https://ui.example.com");

    let denied = send(app.clone(), preflight("https://evil.example.com")).await;
    assert!(!denied.headers().contains_key("access-control-allow-origin"));

    let request = process_request()
        .header("origin", "https://ui.example.com")
        .body(Body::from(json!({"input_data": "x"}).to_string()))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "https://ui.example.com");
    let exposed = response.headers()["access-control-expose-headers"].to_str().unwrap();
    assert!(exposed.contains("x-request-id"), "{}", exposed);
}

#[tokio::test]
async fn test_server_serves_over_tcp_and_drains_on_shutdown() {
    let a = MockBackend::fixed(Reply::json(r#"{"a":1}"#).after(Duration::from_millis(100))).await;
    let config = parse_config(&format!(
        r#"
        [[upstreams]]
        name = "source_a"
        base_url = "{}"
        max_retries = 0
        "#,
        a.url()
    ))
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(HttpServer::new(config).unwrap().run(listener, shutdown.subscribe()));

    let in_flight = tokio::spawn(
        reqwest::Client::new()
            .post(format!("http://{}/process", addr))
            .json(&json!({"input_data": "x"}))
            .send(),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown.trigger();

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: ProcessResponse = response.json().await.unwrap();
    assert_eq!(body.sources["source_a"], Some(json!({"a": 1})));

    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server should stop after draining")
        .unwrap()
        .unwrap();
}
