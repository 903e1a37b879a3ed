//! Error types for vimview-invoke

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while invoking a remote operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// Failed to reach the remote endpoint
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Endpoint answered with a non-success status
    #[error("HTTP error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Server rejected the operation with a fault
    #[error("remote fault {name}: {message}")]
    Fault {
        /// Fault type name (e.g. `InvalidLogin`)
        name: String,
        /// Localized fault message
        message: String,
    },

    /// Request timed out
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Response could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No session established
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl InvokeError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InvokeError::ConnectionFailed(_) | InvokeError::Timeout { .. }
        )
    }

    /// Fault name, if the server returned a fault
    #[must_use]
    pub fn fault_name(&self) -> Option<&str> {
        match self {
            InvokeError::Fault { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(InvokeError::ConnectionFailed("refused".into()).is_retryable());
        assert!(
            InvokeError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!InvokeError::NotConnected.is_retryable());
    }

    #[test]
    fn test_fault_display() {
        let err = InvokeError::Fault {
            name: "InvalidLogin".into(),
            message: "Cannot complete login".into(),
        };
        assert_eq!(err.fault_name(), Some("InvalidLogin"));
        assert_eq!(
            err.to_string(),
            "remote fault InvalidLogin: Cannot complete login"
        );
    }
}
