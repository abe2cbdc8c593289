//! Error types for the backend client

use flow_editor::FlowError;
use thiserror::Error;

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while talking to the backend
///
/// None of these touch editor state; callers surface them as notices.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-2xx response, or an envelope with `success == false`
    #[error("API error {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Local editor operation failed while applying a backend result
    #[error(transparent)]
    Editor(#[from] FlowError),
}

impl ClientError {
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::api(status.as_u16(), err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout("slow".into()).is_retryable());
        assert!(ClientError::api(503, "down").is_retryable());
        assert!(ClientError::api(429, "busy").is_retryable());
        assert!(!ClientError::api(404, "gone").is_retryable());
        assert!(!ClientError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn test_editor_error_passes_through() {
        let err: ClientError = FlowError::node_not_found("n1").into();
        assert_eq!(err.to_string(), "Node not found: n1");
    }
}
