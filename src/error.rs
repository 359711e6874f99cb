//! Error types for imagen-dispatch
//!
//! Two layers of errors exist:
//! - [`Error`] covers process-level failures (bad configuration, an empty
//!   credential pool, a generator that is shutting down). Only these ever
//!   reach the embedding application as `Err`.
//! - [`ClientError`] covers a single call made by one credential client.
//!   These are contained at the client boundary and turned into pool
//!   exclusions or per-job [`Outcome`](crate::types::Outcome) values.

use thiserror::Error;

/// Result type alias for imagen-dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imagen-dispatch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "credentials")
        key: Option<String>,
    },

    /// Every configured credential failed pipeline resolution
    #[error("no usable credentials: all {attempted} credential(s) failed pipeline resolution")]
    NoUsableCredentials {
        /// Number of credentials that were tried
        attempted: usize,
    },

    /// Shutdown in progress - not accepting new generation requests
    #[error("shutdown in progress: not accepting new generation requests")]
    ShuttingDown,

    /// A detached run was torn down before producing its report (runtime shutdown)
    #[error("generation run {request_id} was aborted before completing")]
    JobAborted {
        /// Local id of the aborted request
        request_id: crate::types::RequestId,
    },

    /// Network error while building shared HTTP state
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure of a single remote call made by one credential client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (timeout, connection refused, reset, ...)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Numeric HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The response body was not the JSON shape we expected
    #[error("malformed response body: {0}")]
    Decode(String),

    /// The service reported an error description for the request
    #[error("service rejected the request: {0}")]
    Api(String),

    /// The service reported the pipeline as temporarily unavailable
    #[error("pipeline unavailable: {0}")]
    ServiceUnavailable(String),

    /// A syntactically valid response that matches no known shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The pipeline listing contained no active text-to-image pipeline
    #[error("no active text-to-image pipeline matched the selector")]
    NoActivePipeline,

    /// Submission was attempted without a resolved pipeline and resolution failed again
    #[error("pipeline id is unresolved: {0}")]
    PipelineUnresolved(String),
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_key() {
        let err = Error::config("at least one credential is required", "credentials");
        match &err {
            Error::Config { message, key } => {
                assert_eq!(message, "at least one credential is required");
                assert_eq!(key.as_deref(), Some("credentials"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "configuration error: at least one credential is required"
        );
    }

    #[test]
    fn no_usable_credentials_message_names_attempt_count() {
        let err = Error::NoUsableCredentials { attempted: 3 };
        assert_eq!(
            err.to_string(),
            "no usable credentials: all 3 credential(s) failed pipeline resolution"
        );
    }

    #[test]
    fn http_status_display_includes_code_and_body() {
        let err = ClientError::HttpStatus {
            status: 401,
            body: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: bad key");
    }
}
