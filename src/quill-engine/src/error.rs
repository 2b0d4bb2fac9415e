//! Error types for Quill Engine.

use thiserror::Error;

/// Result type alias for Quill operations.
pub type Result<T> = std::result::Result<T, QuillError>;

/// Main error type for Quill Engine.
#[derive(Debug, Error)]
pub enum QuillError {
    // Request errors
    #[error("{0}")]
    Validation(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Provider errors
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Provider rejected the request: {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Provider error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    // Network errors
    #[error("Connection failed to {endpoint}: {message}")]
    ConnectionFailed { endpoint: String, message: String },

    #[error("Request timeout")]
    Timeout,
}

impl QuillError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a transport failure from reqwest.
    pub fn from_reqwest(e: reqwest::Error, endpoint: &str) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        Self::ConnectionFailed {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    }

    /// Classify a non-success provider status into an error.
    pub fn from_status(status: u16, message: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            401 | 403 => Self::Authentication { message },
            429 => Self::RateLimit {
                message,
                retry_after_secs,
            },
            500..=599 => Self::Upstream { status, message },
            _ => Self::InvalidRequest { status, message },
        }
    }

    /// Check if this error is transient and worth another attempt.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. }
                | Self::Upstream { .. }
                | Self::ConnectionFailed { .. }
                | Self::Timeout
        )
    }

    /// Get the retry-after value in seconds if the provider sent one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            QuillError::from_status(401, "bad key".into(), None),
            QuillError::Authentication { .. }
        ));
        assert!(matches!(
            QuillError::from_status(429, "slow down".into(), Some(7)),
            QuillError::RateLimit {
                retry_after_secs: Some(7),
                ..
            }
        ));
        assert!(matches!(
            QuillError::from_status(503, "overloaded".into(), None),
            QuillError::Upstream { status: 503, .. }
        ));
        assert!(matches!(
            QuillError::from_status(400, "bad body".into(), None),
            QuillError::InvalidRequest { status: 400, .. }
        ));
    }

    #[test]
    fn test_retriable() {
        assert!(QuillError::Timeout.is_retriable());
        assert!(QuillError::from_status(502, String::new(), None).is_retriable());
        assert!(!QuillError::from_status(401, String::new(), None).is_retriable());
        assert!(!QuillError::from_status(422, String::new(), None).is_retriable());
        assert!(!QuillError::validation("Prompt is required").is_retriable());
    }
}
