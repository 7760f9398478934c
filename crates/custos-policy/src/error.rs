//! Error types for policy evaluation.

use thiserror::Error;

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised while evaluating a policy.
///
/// Any of these resolves to a deny at the decision boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    /// A composite policy names a policy that is not registered.
    #[error("policy '{policy}' references unknown policy '{member}'")]
    UnknownMember {
        /// The composite policy.
        policy: String,
        /// The missing member.
        member: String,
    },

    /// Composite policies nest too deeply, most likely in a cycle.
    #[error("policy '{policy}' exceeded nesting depth {depth}")]
    DepthExceeded {
        /// Policy being evaluated when the limit was hit.
        policy: String,
        /// The limit.
        depth: usize,
    },

    /// A composite policy was evaluated without a registry to resolve members.
    #[error("policy '{0}' needs a registry to resolve its members")]
    MissingRegistry(String),

    /// The predicate itself failed.
    #[error("policy '{policy}' failed: {message}")]
    Evaluation {
        /// The failing policy.
        policy: String,
        /// What went wrong.
        message: String,
    },
}

impl PolicyError {
    /// Create an evaluation error.
    pub fn evaluation(policy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            policy: policy.into(),
            message: message.into(),
        }
    }
}
