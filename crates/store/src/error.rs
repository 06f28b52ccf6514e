//! Store error types.

use thiserror::Error;

/// Registration store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registration not found: {0}")]
    NotFound(String),

    #[error("registration already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether this error means the record was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
