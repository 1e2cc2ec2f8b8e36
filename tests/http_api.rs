//! HTTP API Tests
//!
//! Drives the full router in-process with `tower::ServiceExt::oneshot`:
//! 1. Class lifecycle over the JSON API
//! 2. `/ingest` pin resolution
//! 3. Error mapping to status codes and `{error, message}` bodies
//! 4. Health and metrics endpoints

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use classsense::class_store::{
    ClassCode, ClassState, ClassStore, InMemoryClassStore, Payload, StoreError, StoreResult,
};
use classsense::http_server::{build_router, ApiState, HttpServerConfig};

fn router_with(store: Arc<dyn ClassStore>) -> Router {
    build_router(&HttpServerConfig::default(), Arc::new(ApiState::new(store)))
}

fn router() -> Router {
    router_with(Arc::new(InMemoryClassStore::new(2)))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create(router: &Router, body: &str) -> String {
    let (status, json) = send(router, post("/api/classes", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    json["pin"].as_str().unwrap().to_string()
}

/// Store whose backend is always down
#[derive(Debug)]
struct BrokenStore;

#[async_trait]
impl ClassStore for BrokenStore {
    async fn create_class(&self, _metadata: Payload) -> StoreResult<ClassCode> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn upsert_sensor(&self, _code: &ClassCode, _payload: Payload) -> StoreResult<()> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn add_emotion(&self, _code: &ClassCode, _payload: Payload) -> StoreResult<()> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn get_state(&self, _code: &ClassCode) -> StoreResult<ClassState> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Backend("connection refused".into()))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

/// Store whose code space is full
#[derive(Debug)]
struct FullStore;

#[async_trait]
impl ClassStore for FullStore {
    async fn create_class(&self, _metadata: Payload) -> StoreResult<ClassCode> {
        Err(StoreError::CodeSpaceExhausted { attempts: 10_000 })
    }

    async fn upsert_sensor(&self, code: &ClassCode, _payload: Payload) -> StoreResult<()> {
        Err(StoreError::ClassNotFound(code.to_string()))
    }

    async fn add_emotion(&self, code: &ClassCode, _payload: Payload) -> StoreResult<()> {
        Err(StoreError::ClassNotFound(code.to_string()))
    }

    async fn get_state(&self, code: &ClassCode) -> StoreResult<ClassState> {
        Err(StoreError::ClassNotFound(code.to_string()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "full"
    }
}

// =============================================================================
// CLASS LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_create_then_poll_empty_state() {
    let router = router();
    let pin = create(&router, r#"{"teacher": "Ms. Varga"}"#).await;
    assert_eq!(pin.len(), 5);

    let (status, state) = send(&router, get(&format!("/api/classes/{}/state", pin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["pin"], json!(pin));
    assert_eq!(state["metadata"], json!({ "teacher": "Ms. Varga" }));
    assert_eq!(state["last_sensor"], Value::Null);
    assert_eq!(state["emotions"], json!([]));
}

#[tokio::test]
async fn test_empty_create_body_is_empty_metadata() {
    let router = router();
    let pin = create(&router, "").await;

    let (_, state) = send(&router, get(&format!("/api/classes/{}/state", pin))).await;
    assert_eq!(state["metadata"], json!({}));
}

#[tokio::test]
async fn test_sensor_and_emotions_show_up_in_state() {
    let router = router();
    let pin = create(&router, "{}").await;

    let (status, body) = send(
        &router,
        post(&format!("/api/classes/{}/ingest", pin), r#"{"noise_db": 48}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ingest_ok");

    for mood in ["focused", "confused", "bored"] {
        let (status, _) = send(
            &router,
            post(
                &format!("/api/classes/{}/emotions", pin),
                &json!({ "mood": mood }).to_string(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, state) = send(&router, get(&format!("/api/classes/{}/state", pin))).await;
    assert_eq!(state["last_sensor"], json!({ "noise_db": 48 }));
    assert!(state["last_sensor_at"].is_string());

    // capacity 2 keeps the two newest, oldest first
    let moods: Vec<_> = state["emotions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["payload"]["mood"].clone())
        .collect();
    assert_eq!(moods, vec![json!("confused"), json!("bored")]);
}

// =============================================================================
// /ingest PIN RESOLUTION
// =============================================================================

#[tokio::test]
async fn test_ingest_with_header_pin() {
    let router = router();
    let pin = create(&router, "{}").await;

    let request = Request::post("/ingest")
        .header("x-class-pin", pin.as_str())
        .body(Body::from(r#"{"co2": 610}"#))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, state) = send(&router, get(&format!("/api/classes/{}/state", pin))).await;
    assert_eq!(state["last_sensor"]["co2"], 610);
}

#[tokio::test]
async fn test_ingest_with_body_pin() {
    let router = router();
    let pin = create(&router, "{}").await;

    let body = json!({ "class_pin": pin, "temp_c": 22.5 }).to_string();
    let (status, _) = send(&router, post("/ingest", &body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, state) = send(&router, get(&format!("/api/classes/{}/state", pin))).await;
    assert_eq!(state["last_sensor"]["temp_c"], 22.5);
    assert_eq!(state["last_sensor"]["class_pin"], json!(pin));
}

#[tokio::test]
async fn test_ingest_without_pin_is_bad_request() {
    let router = router();

    let (status, body) = send(&router, post("/ingest", r#"{"temp_c": 20}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_class_pin");
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

#[tokio::test]
async fn test_unknown_pin_is_not_found() {
    let router = router();

    let (status, body) = send(&router, get("/api/classes/99999/state")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "class_not_found");
    assert!(body["message"].is_string());

    let (status, _) = send(&router, post("/api/classes/99999/emotions", "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_pin_is_not_found() {
    let router = router();

    let (status, body) = send(&router, get("/api/classes/abc/state")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "class_not_found");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let router = router();
    let pin = create(&router, "{}").await;

    let (status, body) = send(
        &router,
        post(&format!("/api/classes/{}/emotions", pin), "{\"mood\":"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_json");

    let (_, state) = send(&router, get(&format!("/api/classes/{}/state", pin))).await;
    assert_eq!(state["emotions"], json!([]));
}

#[tokio::test]
async fn test_exhausted_code_space_is_service_unavailable() {
    let router = router_with(Arc::new(FullStore));

    let (status, body) = send(&router, post("/api/classes", "{}")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "code_space_exhausted");
}

#[tokio::test]
async fn test_backend_failure_is_internal_error() {
    let router = router_with(Arc::new(BrokenStore));

    let (status, body) = send(&router, post("/api/classes", "{}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "storage_failure");
}

// =============================================================================
// HEALTH AND METRICS
// =============================================================================

#[tokio::test]
async fn test_health_reports_backend() {
    let router = router();

    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");

    let (status, _) = send(&router, get("/observability/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_unavailable_when_backend_down() {
    let router = router_with(Arc::new(BrokenStore));

    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let router = router();
    let pin = create(&router, "{}").await;
    send(&router, post(&format!("/api/classes/{}/emotions", pin), "{}")).await;
    send(&router, get("/api/classes/99999/state")).await;
    send(&router, post("/ingest", "{}")).await;

    let (status, metrics) = send(&router, get("/observability/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["classes_created"], 1);
    assert_eq!(metrics["emotions_recorded"], 1);
    assert_eq!(metrics["class_not_found"], 1);
    assert_eq!(metrics["rejected_requests"], 1);
}

#[tokio::test]
async fn test_cors_preflight_allows_pin_header() {
    let router = router();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/ingest")
        .header("origin", "http://dashboard.local")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-class-pin")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}
