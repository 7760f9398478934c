//! Authorization decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a decision came out the way it did.
///
/// `Decision::allow` collapses every outcome to a boolean; the code keeps
/// the distinction for logs and for mapping outages to a 5xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCode {
    /// The bound policy granted access.
    Granted,
    /// The bound policy denied access.
    Denied,
    /// No policy is bound to the entity type and action.
    NoBinding,
    /// The bound policy name is not registered.
    PolicyNotFound,
    /// The attribute store could not be reached to build the bundle.
    BackingStoreUnavailable,
    /// The policy failed while evaluating.
    PolicyError,
}

impl DecisionCode {
    /// Returns the snake_case name used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::NoBinding => "no_binding",
            Self::PolicyNotFound => "policy_not_found",
            Self::BackingStoreUnavailable => "backing_store_unavailable",
            Self::PolicyError => "policy_error",
        }
    }

    /// Returns true for misconfiguration (missing binding or policy).
    pub const fn is_configuration_defect(self) -> bool {
        matches!(self, Self::NoBinding | Self::PolicyNotFound)
    }

    /// Returns true when the deny came from a failure rather than a policy.
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::NoBinding | Self::PolicyNotFound | Self::BackingStoreUnavailable | Self::PolicyError
        )
    }
}

impl fmt::Display for DecisionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of an authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action is allowed.
    pub allow: bool,
    /// Human-readable explanation, for audit logs. Never shown to clients.
    pub reason: String,
    /// Outcome classification.
    pub code: DecisionCode,
    /// The policy that was evaluated, if one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl Decision {
    /// Access granted by `policy`.
    pub fn grant(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
            code: DecisionCode::Granted,
            policy: Some(policy.into()),
        }
    }

    /// Access denied by `policy`.
    pub fn deny(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            code: DecisionCode::Denied,
            policy: Some(policy.into()),
        }
    }

    /// Denied because nothing is bound to the entity type and action.
    pub fn no_binding(entity_type: Option<&str>, action: &str) -> Self {
        let target = entity_type.unwrap_or("<none>");
        Self {
            allow: false,
            reason: format!("no policy bound for action '{action}' on entity type '{target}'"),
            code: DecisionCode::NoBinding,
            policy: None,
        }
    }

    /// Denied because the bound policy is not registered.
    pub fn policy_not_found(policy: impl Into<String>) -> Self {
        let policy = policy.into();
        Self {
            allow: false,
            reason: format!("policy not found: {policy}"),
            code: DecisionCode::PolicyNotFound,
            policy: Some(policy),
        }
    }

    /// Denied because the attribute store was unavailable.
    pub fn store_unavailable(policy: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self {
            allow: false,
            reason: format!("attribute store unavailable: {detail}"),
            code: DecisionCode::BackingStoreUnavailable,
            policy: Some(policy.into()),
        }
    }

    /// Denied because the policy failed.
    pub fn policy_error(policy: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self {
            allow: false,
            reason: format!("policy evaluation failed: {detail}"),
            code: DecisionCode::PolicyError,
            policy: Some(policy.into()),
        }
    }

    /// Returns true if access is allowed.
    pub const fn is_allowed(&self) -> bool {
        self.allow
    }

    /// Returns true if the deny came from an outage of the attribute store.
    pub fn is_unavailable(&self) -> bool {
        self.code == DecisionCode::BackingStoreUnavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant() {
        let decision = Decision::grant("billing_staff", "holds role billing_admin");
        assert!(decision.is_allowed());
        assert_eq!(decision.code, DecisionCode::Granted);
        assert_eq!(decision.policy.as_deref(), Some("billing_staff"));
    }

    #[test]
    fn test_no_binding_is_configuration_defect() {
        let decision = Decision::no_binding(Some("invoice"), "delete");
        assert!(!decision.allow);
        assert!(decision.code.is_configuration_defect());
        assert!(decision.reason.contains("no policy bound"));
    }

    #[test]
    fn test_policy_not_found() {
        let decision = Decision::policy_not_found("missing");
        assert!(!decision.allow);
        assert_eq!(decision.reason, "policy not found: missing");
    }

    #[test]
    fn test_store_unavailable() {
        let decision = Decision::store_unavailable("p", "connection refused");
        assert!(!decision.allow);
        assert!(decision.is_unavailable());
        assert!(decision.code.is_error());
        assert!(!decision.code.is_configuration_defect());
    }

    #[test]
    fn test_plain_deny_is_not_error() {
        assert!(!DecisionCode::Denied.is_error());
        assert!(!DecisionCode::Granted.is_error());
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&DecisionCode::PolicyNotFound).unwrap();
        assert_eq!(json, "\"policy_not_found\"");
    }
}
