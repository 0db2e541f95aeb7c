//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Server returned a non-success response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the server, or the bare status line.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service answered the streaming endpoint with something other
    /// than an event stream.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The request was cancelled by its caller.
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Check if the operation was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }

    /// Check if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Http(e) if e.is_timeout())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body some deployments attach to failed responses.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(alias = "error")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_server_error() {
        let err = Error::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_server_error());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_status_classification() {
        let err = Error::Api {
            status: 503,
            message: "HTTP 503".to_string(),
        };
        assert!(err.is_server_error());
        assert!(!err.is_cancelled());

        let err = Error::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(!err.is_server_error());
    }
}
