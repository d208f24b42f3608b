//! API Error Types
//!
//! Errors of the HTTP layer, answered as problem-detail documents
//! (`application/problem+json`).

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::service::QueryMeterError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request could not be decoded
    #[error("{0}")]
    BadRequest(String),

    /// Meter request failed
    #[error(transparent)]
    Meter(#[from] QueryMeterError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Meter(e) => e.status_code(),
            ApiError::Internal(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Problem-detail response body
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub request_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                status = status.as_u16(),
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ProblemDetails {
            kind: "about:blank".to_string(),
            title: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            status: status.as_u16(),
            detail: self.to_string(),
            request_id,
        };

        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(body),
        )
            .into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
