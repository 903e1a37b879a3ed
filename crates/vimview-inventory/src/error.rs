//! Error types for vimview-inventory

use thiserror::Error;
use vimview_invoke::{InvokeError, ObjectIdentity};

/// Errors that can occur during inventory operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InventoryError {
    /// Transport fault, passed through unchanged from the invoker
    #[error(transparent)]
    Transport(#[from] InvokeError),

    /// Remote type name with no registered view
    #[error("unknown managed object type: {0}")]
    UnknownType(String),

    /// Entity type outside the searchable set
    #[error("unsupported entity type for inventory search: {0}")]
    UnsupportedEntityType(String),

    /// Batch fetch given identities of different types
    #[error("mixed-type batch: expected {expected}, found {found}")]
    MixedTypeBatch {
        /// Type of the first identity in the batch
        expected: String,
        /// First differing type
        found: String,
    },

    /// Batch fetch given no identities
    #[error("batch fetch requires at least one identity")]
    EmptyBatch,

    /// Query matched nothing where one object was required
    #[error("not found: {0}")]
    NotFound(String),

    /// Server violated the expected protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failed to decode a server response
    #[error("parse error: {0}")]
    Parse(String),

    /// Inconsistent view schema
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InventoryError {
    /// Not-found error naming an object identity
    #[must_use]
    pub fn object_not_found(identity: &ObjectIdentity) -> Self {
        InventoryError::NotFound(format!("object {identity}"))
    }

    /// Check if the error was raised locally before any network call
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InventoryError::UnsupportedEntityType(_)
                | InventoryError::MixedTypeBatch { .. }
                | InventoryError::EmptyBatch
                | InventoryError::UnknownType(_)
        )
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::Transport(e) if e.is_retryable())
    }
}

/// Result type for inventory operations
pub type Result<T> = std::result::Result<T, InventoryError>;
