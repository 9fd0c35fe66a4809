//! Error types for rpclb

use thiserror::Error;

/// Main error type for rpclb
///
/// Payloads are plain strings so the error can be cloned into
/// [`BalancerEvent::Error`](crate::BalancerEvent::Error) notifications.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LbError {
    /// No pooled connection is both connected and breaker-closed
    #[error("no backend available")]
    NoBackendAvailable,

    /// The resolver produced an operation the balancer does not understand
    #[error("unknown update op, {0}")]
    UnknownUpdateOperation(String),

    /// The watcher failed or could not be closed
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// The connection factory could not create a client
    #[error("Connection error for {address}: {reason}")]
    Connection {
        /// Backend address the client was requested for
        address: String,
        /// Factory-supplied reason
        reason: String,
    },

    /// Operation on a closed balancer or watcher
    #[error("balancer closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for rpclb operations
pub type LbResult<T> = Result<T, LbError>;

impl LbError {
    /// Whether a caller may reasonably retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, LbError::NoBackendAvailable)
    }
}

impl From<toml::de::Error> for LbError {
    fn from(err: toml::de::Error) -> Self {
        LbError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LbError::UnknownUpdateOperation("MODIFY".to_string());
        assert_eq!(err.to_string(), "unknown update op, MODIFY");

        let err = LbError::Connection {
            address: "10.0.0.1:50051".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(err.to_string(), "Connection error for 10.0.0.1:50051: refused");
    }

    #[test]
    fn test_only_no_backend_is_retryable() {
        assert!(LbError::NoBackendAvailable.is_retryable());
        assert!(!LbError::Closed.is_retryable());
        assert!(!LbError::Resolver("gone".to_string()).is_retryable());
    }

    #[test]
    fn test_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: LbError = toml_err.into();
        assert!(matches!(err, LbError::Config(_)));
    }
}
