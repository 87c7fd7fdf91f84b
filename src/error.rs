//! Error types for Mirante.
//!
//! This module defines `MiranteError`, the unified error type used throughout
//! the crate for consistent error handling and propagation.
//!
//! # Security
//!
//! All error messages are sanitized to ensure the upstream API token is never
//! leaked in logs or error output. Use `sanitize_message()` when constructing
//! error messages from external sources.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all Mirante operations.
///
/// Each variant provides specific context about the failure, enabling
/// meaningful error messages without leaking sensitive information
/// like the API token.
#[derive(Error, Debug)]
pub enum MiranteError {
    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP request failed during transmission.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// HTTP response returned a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: reqwest::StatusCode,
        /// The response body, potentially containing error details.
        body: String,
    },

    /// Request timed out.
    #[error("request timed out after {duration:?} - the server may be slow or unreachable")]
    Timeout {
        /// How long we waited before timing out.
        duration: Duration,
        /// The operation that timed out.
        operation: String,
    },

    /// Rate limited by the server (HTTP 429).
    #[error("rate limited by server - please wait before retrying")]
    RateLimited {
        /// Suggested retry delay, if provided by server.
        retry_after: Option<Duration>,
    },

    /// Server temporarily unavailable (HTTP 502/503/504).
    #[error("service temporarily unavailable ({status}) - will retry automatically")]
    ServiceUnavailable {
        /// The specific status code.
        status: reqwest::StatusCode,
    },

    /// The upstream responded with a shape we cannot interpret as a record list.
    #[error("unexpected upstream payload for {path}: {detail}")]
    Payload {
        /// The API path that produced the payload.
        path: String,
        /// What was wrong with the payload shape.
        detail: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed - likely an invalid API token.
    #[error("authentication failed - check OPA_API_TOKEN")]
    Authentication,

    /// Connection test failed.
    #[error("connection test failed: {message}")]
    ConnectionTest {
        /// Details about why the connection test failed.
        message: String,
    },
}

impl MiranteError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        MiranteError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        MiranteError::Config(message.into())
    }

    /// Creates a payload error for an unexpected upstream response shape.
    pub fn payload(path: impl Into<String>, detail: impl Into<String>) -> Self {
        MiranteError::Payload {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration, operation: impl Into<String>) -> Self {
        MiranteError::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Creates a connection test error.
    pub fn connection_test(message: impl Into<String>) -> Self {
        MiranteError::ConnectionTest {
            message: message.into(),
        }
    }

    /// Returns true if this error is transient and the operation should be retried.
    ///
    /// Retryable errors include:
    /// - Rate limiting (HTTP 429)
    /// - Service unavailable (HTTP 502, 503, 504)
    /// - Timeouts (may succeed on retry)
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            MiranteError::RateLimited { .. } => true,
            MiranteError::ServiceUnavailable { .. } => true,
            MiranteError::Timeout { .. } => true,
            MiranteError::Http(e) => e.is_timeout() || e.is_connect(),
            MiranteError::HttpStatus { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            _ => false,
        }
    }

    /// Returns true if this is a rate limit error, indicating we should back off.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, MiranteError::RateLimited { .. })
            || matches!(self, MiranteError::HttpStatus { status, .. } if status.as_u16() == 429)
    }

    /// Returns the suggested delay before retry, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MiranteError::RateLimited { retry_after } => *retry_after,
            MiranteError::ServiceUnavailable { .. } => Some(Duration::from_millis(500)),
            MiranteError::Timeout { .. } => Some(Duration::from_millis(100)),
            _ => None,
        }
    }

    /// Sanitizes an error message to remove any occurrence of the API token.
    ///
    /// This is critical for security - the token must never appear in logs,
    /// error messages, or output.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to sanitize
    /// * `api_token` - The token to strip from the message
    ///
    /// # Returns
    ///
    /// The message with any occurrence of the token replaced with `[REDACTED]`
    #[must_use]
    pub fn sanitize_message(message: &str, api_token: &str) -> String {
        if api_token.is_empty() {
            return message.to_string();
        }
        message.replace(api_token, "[REDACTED]")
    }

    /// Creates a sanitized version of this error's display message.
    ///
    /// Use this when you need to include error details in logs and want to
    /// ensure no sensitive data is leaked.
    #[must_use]
    pub fn sanitized_display(&self, api_token: &str) -> String {
        Self::sanitize_message(&self.to_string(), api_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_error() {
        let err = MiranteError::missing_env("OPA_API_TOKEN");
        assert!(err.to_string().contains("OPA_API_TOKEN"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_payload_error() {
        let err = MiranteError::payload("/atendimento", "expected an array");
        let msg = err.to_string();
        assert!(msg.contains("/atendimento"));
        assert!(msg.contains("expected an array"));
    }

    #[test]
    fn test_timeout_error() {
        let err = MiranteError::timeout(Duration::from_secs(30), "fetch_snapshot");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("30s"));
    }

    #[test]
    fn test_is_retryable_rate_limited() {
        let err = MiranteError::RateLimited { retry_after: None };
        assert!(err.is_retryable());
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_is_retryable_service_unavailable() {
        let err = MiranteError::ServiceUnavailable {
            status: reqwest::StatusCode::BAD_GATEWAY,
        };
        assert!(err.is_retryable());
        assert!(!err.is_rate_limit());
    }

    #[test]
    fn test_is_retryable_payload() {
        let err = MiranteError::payload("/cliente", "not a list");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_is_retryable_config() {
        let err = MiranteError::invalid_config("bad url");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_sanitize_message_removes_token() {
        let token = "super_secret_token_12345";
        let message = format!("Error connecting with token {} to server", token);
        let sanitized = MiranteError::sanitize_message(&message, token);
        assert!(!sanitized.contains(token));
        assert!(sanitized.contains("[REDACTED]"));
    }

    #[test]
    fn test_sanitize_message_empty_token() {
        let message = "Some error message";
        let sanitized = MiranteError::sanitize_message(message, "");
        assert_eq!(sanitized, message);
    }

    #[test]
    fn test_retry_after_rate_limited() {
        let err = MiranteError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_retry_after_service_unavailable() {
        let err = MiranteError::ServiceUnavailable {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_connection_test_error() {
        let err = MiranteError::connection_test("Could not reach server");
        let msg = err.to_string();
        assert!(msg.contains("connection test failed"));
        assert!(msg.contains("Could not reach server"));
    }
}
