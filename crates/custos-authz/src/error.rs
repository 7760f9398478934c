//! Error types for the authorization crate.

use custos_cache::CacheError;
use custos_core::{AttributeKind, SchemaError};
use custos_store::{BulkFailure, StoreError};
use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur in the authorization core.
///
/// `authorize` never returns these: every failure there resolves to a
/// deny [`Decision`](custos_core::Decision) whose code keeps the
/// distinction. They surface from bundle refresh, invalidation and the
/// administrative mutations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// A binding or policy is missing, or a manifest is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The attribute cache could not be reached.
    #[error("attribute cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The attribute store could not be reached or timed out.
    #[error("attribute store unavailable: {0}")]
    BackingStoreUnavailable(String),

    /// An attribute value does not match the declared kind.
    #[error("attribute '{attribute}' expects {expected}, got {actual}")]
    AttributeTypeMismatch {
        /// Attribute name.
        attribute: String,
        /// Declared kind.
        expected: AttributeKind,
        /// Kind of the supplied value.
        actual: AttributeKind,
    },

    /// A policy failed while evaluating.
    #[error("policy evaluation failed: {0}")]
    PolicyEvaluation(String),

    /// The attribute is not declared by the service.
    #[error("unknown attribute '{attribute}' for service {service}")]
    UnknownAttribute {
        /// Service.
        service: String,
        /// Attribute name.
        attribute: String,
    },

    /// The service is not registered.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The role is not declared by the service.
    #[error("unknown role '{role}' for service {service}")]
    UnknownRole {
        /// Service.
        service: String,
        /// Role name.
        role: String,
    },

    /// The user does not exist.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// The role assignment does not exist.
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

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AuthzError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a backing store error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::BackingStoreUnavailable(message.into())
    }

    /// Check if the attribute store is at fault.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackingStoreUnavailable(_))
    }

    /// Check if this is a retryable error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BackingStoreUnavailable(_) | Self::CacheUnavailable(_))
    }

    /// Check if the caller sent something the schema rejects.
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::AttributeTypeMismatch { .. }
                | Self::UnknownAttribute { .. }
                | Self::UnknownService(_)
                | Self::UnknownRole { .. }
                | Self::UnknownUser(_)
                | Self::AssignmentNotFound(_)
                | Self::BulkRejected { .. }
                | Self::InvalidRequest(_)
        )
    }
}

impl From<SchemaError> for AuthzError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::TypeMismatch {
                attribute,
                expected,
                actual,
            } => Self::AttributeTypeMismatch {
                attribute,
                expected,
                actual,
            },
            SchemaError::UnknownAttribute { service, attribute } => {
                Self::UnknownAttribute { service, attribute }
            }
            SchemaError::UnknownRole { service, role } => Self::UnknownRole { service, role },
            other => Self::Configuration(other.to_string()),
        }
    }
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => Self::BackingStoreUnavailable(message),
            StoreError::Schema(schema) => schema.into(),
            StoreError::UnknownService(service) => Self::UnknownService(service),
            StoreError::UnknownUser(user) => Self::UnknownUser(user),
            StoreError::AssignmentNotFound(id) => Self::AssignmentNotFound(id),
            StoreError::BulkRejected { total, failures } => Self::BulkRejected { total, failures },
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl From<CacheError> for AuthzError {
    fn from(err: CacheError) -> Self {
        Self::CacheUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_maps_to_backing_store() {
        let err: AuthzError = StoreError::unavailable("connection refused").into();
        assert!(err.is_unavailable());
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "attribute store unavailable: connection refused");
    }

    #[test]
    fn test_type_mismatch_maps_through() {
        let err: AuthzError = StoreError::Schema(SchemaError::TypeMismatch {
            attribute: "budget_limit".to_string(),
            expected: AttributeKind::Integer,
            actual: AttributeKind::String,
        })
        .into();
        assert!(matches!(err, AuthzError::AttributeTypeMismatch { .. }));
        assert!(err.is_invalid_input());
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_invalid_manifest_is_configuration() {
        let err: AuthzError = SchemaError::invalid_manifest("duplicate role").into();
        assert!(matches!(err, AuthzError::Configuration(_)));
    }

    #[test]
    fn test_cache_error_maps_to_cache_unavailable() {
        let err: AuthzError = CacheError::unavailable("reset").into();
        assert!(matches!(err, AuthzError::CacheUnavailable(_)));
        assert!(err.is_retryable());
        assert!(!err.is_unavailable());
    }
}
