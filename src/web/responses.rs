//! HTTP response types and utilities
//!
//! Response bodies keep the field names existing players already consume
//! (`m3u8_url`, `plan_used`), even for progressive links.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{ResolutionResult, ResolutionStatus};

/// Body returned by `POST /extract`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub status: ResolutionStatus,
    pub m3u8_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub plan_used: Option<String>,
}

impl From<&ResolutionResult> for ExtractResponse {
    fn from(result: &ResolutionResult) -> Self {
        if result.is_success() {
            Self {
                status: ResolutionStatus::Success,
                m3u8_url: result.stream_url().map(str::to_string),
                original_url: Some(result.original_url().to_string()),
                message: None,
                plan_used: result.plan_used().map(str::to_string),
            }
        } else {
            Self {
                status: ResolutionStatus::Error,
                m3u8_url: None,
                original_url: None,
                message: result.message().map(str::to_string),
                plan_used: result.plan_used().map(str::to_string),
            }
        }
    }
}

impl IntoResponse for ExtractResponse {
    fn into_response(self) -> Response {
        let status = match self.status {
            ResolutionStatus::Success => StatusCode::OK,
            ResolutionStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Body for requests rejected at the boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

pub fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

/// Map an application error to an HTTP response
pub fn handle_error(error: AppError) -> Response {
    match error {
        AppError::Validation { message } => bad_request(&message),
        other => {
            tracing::error!("Request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal server error")),
            )
                .into_response()
        }
    }
}
