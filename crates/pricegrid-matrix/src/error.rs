//! Error types for price-matrix operations.

/// Error type for price-matrix operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A location code is not three ASCII letters.
    #[error("Invalid location code: {0:?}")]
    InvalidLocation(String),

    /// The pricing service could not be reached or rejected the request.
    #[error("Transport error: {0}")]
    Transport(#[from] pricegrid_client::Error),

    /// An operation needs an active search but none was loaded.
    #[error("No active search")]
    NoActiveSearch,

    /// A background session task panicked or was aborted.
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Check if this error came from the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if the pricing service did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_timeout())
    }
}

/// Result type for price-matrix operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let err = Error::from(pricegrid_client::Error::Api {
            status: 502,
            message: "HTTP 502".to_string(),
        });
        assert!(err.is_transport());
        assert!(!err.is_timeout());

        assert!(!Error::NoActiveSearch.is_transport());
        assert!(!Error::NoActiveSearch.is_timeout());
    }
}
