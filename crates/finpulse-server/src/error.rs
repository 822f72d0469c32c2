//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use finpulse_core::error::PulseError;
use serde::Serialize;
use std::fmt;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<PulseError> for ApiError {
    fn from(err: PulseError) -> Self {
        let code = err.code().as_str();
        let status = match &err {
            PulseError::NotFound { .. } => StatusCode::NOT_FOUND,
            PulseError::Validation { .. } | PulseError::Parse { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PulseError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            PulseError::Configuration(_) | PulseError::UnsupportedProvider { .. } => {
                StatusCode::BAD_REQUEST
            }
            PulseError::Reasoning { .. } | PulseError::Network { .. } => StatusCode::BAD_GATEWAY,
            PulseError::Database { .. }
            | PulseError::Cache { .. }
            | PulseError::Io(_)
            | PulseError::Serialization(_)
            | PulseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut api = ApiError::new(status, code, err.to_string());
        if let Some(suggestion) = err.suggestion() {
            api = api.with_details(serde_json::json!({ "suggestion": suggestion }));
        }
        api
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let api = ApiError::from(PulseError::intervention_not_found("abc"));
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.code, "ENT_001");
    }

    #[test]
    fn test_validation_maps_to_422() {
        let api = ApiError::from(PulseError::validation("bad rating"));
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.code, "VAL_001");
    }
}
