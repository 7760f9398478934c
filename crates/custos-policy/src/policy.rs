//! The policy trait.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::PolicyContext;
use crate::error::PolicyResult;

/// Introspectable classification of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// [`crate::AlwaysAllow`].
    AlwaysAllow,
    /// [`crate::AlwaysDeny`].
    AlwaysDeny,
    /// [`crate::AuthenticatedOnly`].
    AuthenticatedOnly,
    /// [`crate::OwnershipCheck`].
    Ownership,
    /// [`crate::RoleMembership`].
    RoleMembership,
    /// [`crate::AttributeEquals`].
    AttributeEquals,
    /// [`crate::TargetAttributeEquals`].
    TargetAttributeEquals,
    /// [`crate::AttributeMatchesTarget`].
    AttributeMatchesTarget,
    /// [`crate::AnyOf`].
    AnyOf,
    /// [`crate::AllOf`].
    AllOf,
    /// A closure or user-defined type.
    Custom,
}

impl PolicyKind {
    /// Returns the snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysAllow => "always_allow",
            Self::AlwaysDeny => "always_deny",
            Self::AuthenticatedOnly => "authenticated_only",
            Self::Ownership => "ownership",
            Self::RoleMembership => "role_membership",
            Self::AttributeEquals => "attribute_equals",
            Self::TargetAttributeEquals => "target_attribute_equals",
            Self::AttributeMatchesTarget => "attribute_matches_target",
            Self::AnyOf => "any_of",
            Self::AllOf => "all_of",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the policy grants.
    pub allowed: bool,
    /// Why, for audit logs.
    pub reason: String,
}

impl Verdict {
    /// A grant.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    /// A deny.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }

    /// A grant or deny depending on `allowed`.
    pub fn from_bool(allowed: bool, granted: impl Into<String>, denied: impl Into<String>) -> Self {
        if allowed {
            Self::allow(granted)
        } else {
            Self::deny(denied)
        }
    }
}

/// A named authorization predicate.
///
/// Evaluation must be pure: no I/O, no writes, no shared mutable state.
/// That keeps decisions replayable and lets callers evaluate one bundle
/// against many targets.
pub trait Policy: Send + Sync + fmt::Debug {
    /// Registry name.
    fn name(&self) -> &str;

    /// Classification for diagnostics.
    fn kind(&self) -> PolicyKind;

    /// Evaluates the policy.
    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict>;

    /// One-line description of what the policy checks.
    fn explain(&self) -> String {
        self.kind().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serialization_matches_as_str() {
        for kind in [PolicyKind::Ownership, PolicyKind::AnyOf, PolicyKind::Custom] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_verdict_from_bool() {
        assert!(Verdict::from_bool(true, "yes", "no").allowed);
        assert_eq!(Verdict::from_bool(false, "yes", "no").reason, "no");
    }
}
