//! HTTP error responses
//!
//! Every failure leaves the API as `{"error": <code>, "message": <text>}` with
//! a status that keeps the three store failure kinds apart.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::class_store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request body is not valid JSON")]
    InvalidJson,

    #[error("No class pin in X-Class-Pin header or class_pin field")]
    MissingClassPin,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidJson => "invalid_json",
            ApiError::MissingClassPin => "missing_class_pin",
            ApiError::Store(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson | ApiError::MissingClassPin => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}
