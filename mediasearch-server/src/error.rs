//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mediasearch_core::MediaSearchError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Service unavailable - the document store cannot be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Error raised by the mediasearch core
    #[error(transparent)]
    Core(#[from] MediaSearchError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Core(ref e) => match e {
                MediaSearchError::Validation(_) => StatusCode::BAD_REQUEST,
                MediaSearchError::NotFound(_) => StatusCode::NOT_FOUND,
                MediaSearchError::Conflict(_) => StatusCode::CONFLICT,
                // Media decoded but no fingerprint could be derived
                MediaSearchError::Hash(_) => StatusCode::UNPROCESSABLE_ENTITY,
                // Upstream media source failed
                MediaSearchError::Fetch(_) => StatusCode::BAD_GATEWAY,
                MediaSearchError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                MediaSearchError::Comparison(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Core(ref e) => match e {
                MediaSearchError::Validation(_) => "INVALID_INPUT",
                MediaSearchError::NotFound(_) => "NOT_FOUND",
                MediaSearchError::Conflict(_) => "CONFLICT",
                MediaSearchError::Hash(_) => "HASH_FAILED",
                MediaSearchError::Fetch(_) => "FETCH_FAILED",
                MediaSearchError::Storage(_) => "STORAGE_UNAVAILABLE",
                MediaSearchError::Comparison(_) => "COMPARISON_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Core(MediaSearchError::Storage(_)) => "Document store unavailable".to_string(),
            Self::Core(MediaSearchError::Comparison(_)) => "Internal server error".to_string(),
            Self::Core(e) => e.to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Core(_) => "core",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "message": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
