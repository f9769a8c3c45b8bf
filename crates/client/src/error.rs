// Error types for the Box API client

use std::time::Duration;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the Box API
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or connection failure
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request exceeded the transport timeout
    #[error("request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// HTTP 429 from the API
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Any other non-2xx response
    #[error("request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    /// Response body was not the expected JSON shape
    #[error("failed to decode response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// Bounded retries failed; carries the last error
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    /// The event stream could not establish its starting position
    #[error("failed to seed stream position: {source}")]
    Seed {
        #[source]
        source: Box<ClientError>,
    },

    /// JWT assertion or token exchange failure
    #[error("authentication error: {0}")]
    Auth(String),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        ClientError::Auth(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ClientError::Configuration(msg.into())
    }

    /// Wrap a seeding failure
    pub fn seed(source: ClientError) -> Self {
        ClientError::Seed {
            source: Box::new(source),
        }
    }

    /// Whether the retry layer may re-issue the request that produced this error.
    ///
    /// Network failures, timeouts, 429, 408 and 5xx are transient. Every other
    /// 4xx (bad token, missing item, malformed request) is permanent, as are
    /// decode and configuration failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout { .. } => true,
            ClientError::RateLimited { .. } => true,
            ClientError::RequestFailed { status, .. } => *status == 408 || *status >= 500,
            ClientError::Decode { .. }
            | ClientError::RetriesExhausted { .. }
            | ClientError::Seed { .. }
            | ClientError::Auth(_)
            | ClientError::Configuration(_) => false,
        }
    }

    /// HTTP status carried by the error, looking through retry/seed wrappers
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => Some(*status),
            ClientError::RateLimited { .. } => Some(429),
            ClientError::RetriesExhausted { source, .. } | ClientError::Seed { source } => {
                source.status()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(status: u16) -> ClientError {
        ClientError::RequestFailed {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(failed(500).is_retryable());
        assert!(failed(503).is_retryable());
        assert!(failed(408).is_retryable());
    }

    #[test]
    fn test_client_errors_are_fatal() {
        assert!(!failed(400).is_retryable());
        assert!(!failed(401).is_retryable());
        assert!(!failed(404).is_retryable());
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = ClientError::RateLimited {
            retry_after: Duration::from_secs(3),
        };
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_decode_is_fatal() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClientError::Decode {
            source,
            body: "{".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_through_wrappers() {
        let err = ClientError::seed(ClientError::RetriesExhausted {
            attempts: 5,
            source: Box::new(failed(502)),
        });
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("seed"));
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(ClientError::auth("x"), ClientError::Auth(_)));
        assert!(matches!(
            ClientError::config("x"),
            ClientError::Configuration(_)
        ));
    }
}
