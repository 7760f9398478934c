//! Schema validation errors.

use thiserror::Error;

use crate::attribute::AttributeKind;

/// Result type for schema validation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised when data does not match a service's declared schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// The attribute is not declared by the service.
    #[error("unknown attribute '{attribute}' for service {service}")]
    UnknownAttribute {
        /// Service whose schema was consulted.
        service: String,
        /// Attribute name.
        attribute: String,
    },

    /// The attribute value has the wrong type.
    #[error("attribute '{attribute}' expects {expected}, got {actual}")]
    TypeMismatch {
        /// Attribute name.
        attribute: String,
        /// Declared kind.
        expected: AttributeKind,
        /// Kind of the supplied value.
        actual: AttributeKind,
    },

    /// The role is not declared by the service.
    #[error("unknown role '{role}' for service {service}")]
    UnknownRole {
        /// Service whose manifest was consulted.
        service: String,
        /// Role name.
        role: String,
    },

    /// The manifest itself is malformed.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

impl SchemaError {
    /// Create an unknown attribute error.
    pub fn unknown_attribute(service: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            service: service.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an unknown role error.
    pub fn unknown_role(service: impl Into<String>, role: impl Into<String>) -> Self {
        Self::UnknownRole {
            service: service.into(),
            role: role.into(),
        }
    }

    /// Create an invalid manifest error.
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest(message.into())
    }

    /// Check if this is a value type mismatch.
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}
