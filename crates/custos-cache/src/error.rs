//! Error types for the attribute cache.

use std::time::Duration;

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in the attribute cache.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The cache backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The cache did not answer in time.
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// A bundle could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Check if the backend, rather than the data, is at fault.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
