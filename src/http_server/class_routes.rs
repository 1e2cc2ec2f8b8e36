//! Class HTTP Routes
//!
//! Endpoints for class creation, sensor ingest, student feedback and the
//! polled state view. Each handler performs exactly one store operation.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use super::errors::ApiError;
use crate::class_store::{ClassCode, ClassState, ClassStore, InMemoryClassStore, Payload, StoreError};
use crate::observability::MetricsRegistry;

/// Header a sensor client may use to name its class on `/ingest`
pub const CLASS_PIN_HEADER: &str = "x-class-pin";

/// Body field naming the class on `/ingest`
pub const CLASS_PIN_FIELD: &str = "class_pin";

// ==================
// Shared State
// ==================

/// State shared across API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub store: Arc<dyn ClassStore>,
    pub metrics: Arc<MetricsRegistry>,
}

impl ApiState {
    pub fn new(store: Arc<dyn ClassStore>) -> Self {
        Self {
            store,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// State over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryClassStore::default()))
    }

    /// Count and log a store failure before handing it to the response layer
    fn store_failure(&self, err: StoreError) -> ApiError {
        self.metrics.record_store_error(&err);
        if let StoreError::Backend(message) = &err {
            error!(backend = self.store.backend_name(), error = %message, "class store failure");
        }
        ApiError::Store(err)
    }

    fn rejected(&self, err: ApiError) -> ApiError {
        self.metrics.increment_rejected_requests();
        err
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct CreateClassResponse {
    pub pin: ClassCode,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

// ==================
// Class Routes
// ==================

/// Create class routes (mounted at the root)
pub fn class_routes(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/classes", post(create_class_handler))
        .route("/api/classes/:pin/ingest", post(ingest_handler))
        .route("/api/classes/:pin/state", get(get_state_handler))
        .route("/api/classes/:pin/emotions", post(add_emotion_handler))
        .route("/ingest", post(ingest_by_pin_handler))
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

/// Parse a request body. Empty means `{}`.
fn parse_body(body: &Bytes) -> Result<Payload, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::empty());
    }

    serde_json::from_slice::<Value>(body)
        .map(Payload::new)
        .map_err(|_| ApiError::InvalidJson)
}

/// Validate a pin from the path or payload. Malformed pins cannot name a
/// class, so they are reported the same way as unknown ones.
fn parse_pin(raw: &str) -> Result<ClassCode, ApiError> {
    ClassCode::parse(raw.trim()).map_err(|_| ApiError::Store(StoreError::ClassNotFound(raw.to_string())))
}

/// Pin for `/ingest`: the header wins, then the `class_pin` body field
fn pin_from_request(headers: &HeaderMap, payload: &Payload) -> Option<String> {
    let from_header = headers
        .get(CLASS_PIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    from_header.or_else(|| match payload.as_value().get(CLASS_PIN_FIELD) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ==================
// Handlers
// ==================

async fn create_class_handler(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateClassResponse>), ApiError> {
    let metadata = parse_body(&body).map_err(|e| state.rejected(e))?;

    let pin = state
        .store
        .create_class(metadata)
        .await
        .map_err(|e| state.store_failure(e))?;
    state.metrics.increment_classes_created();

    Ok((StatusCode::CREATED, Json(CreateClassResponse { pin })))
}

async fn ingest_handler(
    State(state): State<Arc<ApiState>>,
    Path(pin): Path<String>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let payload = parse_body(&body).map_err(|e| state.rejected(e))?;
    let code = parse_pin(&pin).map_err(|e| state.rejected(e))?;

    store_sensor(&state, &code, payload).await
}

async fn ingest_by_pin_handler(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let payload = parse_body(&body).map_err(|e| state.rejected(e))?;
    let pin = pin_from_request(&headers, &payload)
        .ok_or_else(|| state.rejected(ApiError::MissingClassPin))?;
    let code = parse_pin(&pin).map_err(|e| state.rejected(e))?;

    store_sensor(&state, &code, payload).await
}

async fn store_sensor(
    state: &ApiState,
    code: &ClassCode,
    payload: Payload,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .store
        .upsert_sensor(code, payload)
        .await
        .map_err(|e| state.store_failure(e))?;
    state.metrics.increment_sensor_updates();

    Ok(Json(StatusResponse {
        status: "ingest_ok",
    }))
}

async fn get_state_handler(
    State(state): State<Arc<ApiState>>,
    Path(pin): Path<String>,
) -> Result<Json<ClassState>, ApiError> {
    let code = parse_pin(&pin).map_err(|e| state.rejected(e))?;

    let class_state = state
        .store
        .get_state(&code)
        .await
        .map_err(|e| state.store_failure(e))?;
    state.metrics.increment_state_reads();

    Ok(Json(class_state))
}

async fn add_emotion_handler(
    State(state): State<Arc<ApiState>>,
    Path(pin): Path<String>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let payload = parse_body(&body).map_err(|e| state.rejected(e))?;
    let code = parse_pin(&pin).map_err(|e| state.rejected(e))?;

    state
        .store
        .add_emotion(&code, payload)
        .await
        .map_err(|e| state.store_failure(e))?;
    state.metrics.increment_emotions_recorded();

    Ok(Json(StatusResponse { status: "recorded" }))
}
