//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid registration id: {0}")]
    InvalidId(String),

    #[error("invalid target URL: {0}")]
    InvalidTargetUrl(String),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
