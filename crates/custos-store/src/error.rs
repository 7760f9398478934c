//! Error types for the attribute store.

use custos_core::SchemaError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One rejected item of a bulk assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    /// Position of the item in the request.
    pub index: usize,
    /// Why it was rejected.
    pub reason: String,
}

/// Errors that can occur in the attribute store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("attribute store unavailable: {0}")]
    Unavailable(String),

    /// The write does not match the service manifest.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The service has not been registered.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The user does not exist.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The referenced assignment does not exist.
    #[error("role assignment not found: {0}")]
    AssignmentNotFound(String),

    /// A bulk assignment was rejected as a whole.
    #[error("bulk assignment rejected: {} of {total} items invalid", failures.len())]
    BulkRejected {
        /// Number of items in the request.
        total: usize,
        /// The invalid items.
        failures: Vec<BulkFailure>,
    },
}

impl StoreError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Check if the backend itself failed, as opposed to the request.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Check if this is an attribute kind mismatch.
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::Schema(SchemaError::TypeMismatch { .. }))
    }
}
