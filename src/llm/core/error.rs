//! Error types for the wrapper layer

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a chat backend adapter
///
/// These are surfaced to callers unchanged; wrappers never swallow them.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// HTTP request failures
    #[error("HTTP error (status {status}): {body}")]
    HttpError { status: u16, body: String },

    /// SSE stream parsing failures
    #[error("Stream error: {0}")]
    StreamError(String),

    /// JSON encoding/decoding issues
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimitExceeded { retry_after: Option<Duration> },

    /// Provider-specific errors
    #[error("Provider error ({code}): {message}")]
    ProviderError { code: String, message: String },
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::HttpError {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            body: err.to_string(),
        }
    }
}

/// Errors returned by the four query operations of a wrapper
#[derive(Debug, Error)]
pub enum WrapperError {
    /// A keyword argument name could not be classified
    #[error("Invalid argument name: {0:?}")]
    InvalidArgumentName(String),

    /// A reserved argument carried a value of the wrong shape
    #[error("Invalid value for argument {name:?}: {reason}")]
    InvalidArgumentValue { name: String, reason: String },

    /// Structured output never validated within the retry budget
    #[error("Schema validation failed for {schema} after {attempts} attempt(s): {reason}")]
    SchemaValidation {
        schema: String,
        attempts: usize,
        reason: String,
    },

    /// No fenced block with the requested label was found
    #[error("No fenced block labeled {label:?} in response")]
    BlockNotFound { label: String },

    /// Failure surfaced from the chat backend
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Failure raised by a decorator hook
    #[error("Hook error: {0}")]
    Hook(String),
}

impl WrapperError {
    /// True when the error originated in the backend adapter
    pub fn is_backend(&self) -> bool {
        matches!(self, WrapperError::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_error() {
        let err = BackendError::AuthenticationError("Invalid token".to_string());
        assert!(err.to_string().contains("Authentication error"));
        assert!(err.to_string().contains("Invalid token"));
    }

    #[test]
    fn test_http_error() {
        let err = BackendError::HttpError {
            status: 404,
            body: "Not found".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Not found"));
    }

    #[test]
    fn test_rate_limit_error() {
        let err = BackendError::RateLimitExceeded {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert!(err.to_string().contains("Rate limit exceeded"));
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: BackendError = json_err.into();
        assert!(matches!(err, BackendError::SerializationError(_)));
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err: WrapperError = BackendError::ProviderError {
            code: "invalid_api_key".to_string(),
            message: "API key is invalid".to_string(),
        }
        .into();
        assert!(err.is_backend());
        assert_eq!(err.to_string(), "Provider error (invalid_api_key): API key is invalid");
    }

    #[test]
    fn test_block_not_found_mentions_label() {
        let err = WrapperError::BlockNotFound {
            label: "python".to_string(),
        };
        assert!(err.to_string().contains("\"python\""));
        assert!(!err.is_backend());
    }

    #[test]
    fn test_schema_validation_message() {
        let err = WrapperError::SchemaValidation {
            schema: "Steps".to_string(),
            attempts: 2,
            reason: "expected array".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Steps"));
        assert!(msg.contains("2 attempt(s)"));
        assert!(msg.contains("expected array"));
    }
}
