//! The policy registry.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::policy::{Policy, PolicyKind};

/// Diagnostic view of a registered policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDescription {
    /// Registry name.
    pub name: String,
    /// Policy kind.
    pub kind: PolicyKind,
    /// What the policy checks.
    pub description: String,
}

/// Name-to-policy table.
///
/// Built once at startup, then shared read-only (typically behind an
/// `Arc`). Registering a name twice replaces the earlier policy; the
/// replacement is logged.
#[derive(Debug, Default, Clone)]
pub struct PolicyRegistry {
    policies: IndexMap<String, Arc<dyn Policy>>,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a policy under its own name. Returns the policy it replaced.
    pub fn register<P>(&mut self, policy: P) -> Option<Arc<dyn Policy>>
    where
        P: Policy + 'static,
    {
        self.register_arc(Arc::new(policy))
    }

    /// Registers a shared policy under its own name. Returns the policy it replaced.
    pub fn register_arc(&mut self, policy: Arc<dyn Policy>) -> Option<Arc<dyn Policy>> {
        let name = policy.name().to_string();
        let kind = policy.kind();
        let previous = self.policies.insert(name.clone(), policy);
        match &previous {
            Some(old) => warn!(
                policy = %name,
                old_kind = %old.kind(),
                new_kind = %kind,
                "policy re-registered, replacing previous definition"
            ),
            None => debug!(policy = %name, kind = %kind, "policy registered"),
        }
        previous
    }

    /// Looks up a policy by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.policies.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.policies.keys().map(String::as_str).collect()
    }

    /// Name, kind and description of every policy, in registration order.
    pub fn describe(&self) -> Vec<PolicyDescription> {
        self.policies
            .iter()
            .map(|(name, policy)| PolicyDescription {
                name: name.clone(),
                kind: policy.kind(),
                description: policy.explain(),
            })
            .collect()
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{AlwaysAllow, AlwaysDeny, OwnershipCheck, RoleMembership};

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PolicyRegistry::new();
        assert!(registry.register(AlwaysAllow::new("open")).is_none());

        let policy = registry.lookup("open").unwrap();
        assert_eq!(policy.kind(), PolicyKind::AlwaysAllow);
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = PolicyRegistry::new();
        registry.register(AlwaysAllow::new("gate"));
        let replaced = registry.register(AlwaysDeny::new("gate"));

        assert_eq!(replaced.unwrap().kind(), PolicyKind::AlwaysAllow);
        assert_eq!(registry.lookup("gate").unwrap().kind(), PolicyKind::AlwaysDeny);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut registry = PolicyRegistry::new();
        registry.register(OwnershipCheck::new("owner"));
        registry.register(AlwaysAllow::new("open"));
        registry.register(RoleMembership::new("staff", ["billing_admin"]));

        assert_eq!(registry.list(), vec!["owner", "open", "staff"]);
    }

    #[test]
    fn test_describe() {
        let mut registry = PolicyRegistry::new();
        registry.register(RoleMembership::new("staff", ["billing_admin", "billing_viewer"]));

        let described = registry.describe();
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].kind, PolicyKind::RoleMembership);
        assert!(described[0].description.contains("billing_viewer"));
    }
}
