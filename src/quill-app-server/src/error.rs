//! Error types for the app server.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use quill_engine::QuillError;
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid request content.
    #[error("{0}")]
    Validation(String),

    /// Body could not be read as JSON.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload too large.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Server is missing required configuration.
    #[error("{0}")]
    Configuration(String),

    /// The provider rejected the credential.
    #[error("{0}")]
    Authentication(String),

    /// Rate limit exceeded after all retries.
    #[error("{message}")]
    RateLimitExceeded {
        message: String,
        retry_after: Option<u64>,
    },

    /// Provider failure after all retries.
    #[error("{0}")]
    Provider(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Configuration(_) => "configuration_error",
            Self::Authentication(_) => "authentication_failed",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::Provider(_) => "provider_error",
            Self::Timeout => "timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Seconds the client should wait before retrying, if known.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Render the error, attaching diagnostic `details` when given.
    pub fn into_response_with_details(self, details: Option<String>) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after();

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code(),
            details,
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let secs = retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// Suggested wait when the provider gave no hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable error code.
    pub code: &'static str,
    /// Diagnostic detail, only outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Seconds to wait before retrying (429 only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with_details(None)
    }
}

/// Result type for the app server.
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<QuillError> for AppError {
    fn from(error: QuillError) -> Self {
        let message = error.to_string();
        match error {
            QuillError::Validation(message) => Self::Validation(message),
            QuillError::Config(_) => Self::Configuration(message),
            QuillError::Authentication { .. } => Self::Authentication(message),
            QuillError::RateLimit {
                retry_after_secs, ..
            } => Self::RateLimitExceeded {
                message,
                retry_after: retry_after_secs,
            },
            QuillError::InvalidRequest { .. }
            | QuillError::Upstream { .. }
            | QuillError::InvalidResponse(_)
            | QuillError::ConnectionFailed { .. } => Self::Provider(message),
            QuillError::Timeout => Self::Timeout,
        }
    }
}
