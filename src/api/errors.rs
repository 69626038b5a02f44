//! API error handling
//!
//! Maps the engine's error taxonomy onto HTTP statuses and renders a
//! structured body carrying the request id.

use crate::errors::{EngineError, ResourceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable code (`insufficient_balance`, `rate_limited`, ...)
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Engine error paired with the request it failed.
#[derive(Debug)]
pub struct ApiError {
    pub request_id: String,
    pub source: EngineError,
}

impl ApiError {
    pub fn new(request_id: String, source: EngineError) -> Self {
        Self { request_id, source }
    }

    fn status(&self) -> StatusCode {
        match &self.source {
            EngineError::Validation(_) | EngineError::State(_) => StatusCode::BAD_REQUEST,
            EngineError::Auth(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Resource(ResourceError::RateLimited { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            EngineError::Resource(_) => StatusCode::BAD_REQUEST,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.request_id, self.source)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: self.source.code().to_string(),
                message: self.source.to_string(),
            },
        });

        (status, body).into_response()
    }
}
