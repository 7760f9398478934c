//! Per-service `(entity type, action) -> policy` bindings.

use std::collections::HashMap;
use std::fmt;

use custos_core::{BindingDecl, ServiceName};
use tracing::warn;

/// The entity type and action a policy is bound to.
///
/// A binding without an entity type applies to requests that carry no
/// target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    /// Entity type, or `None` for action-level bindings.
    pub entity_type: Option<String>,
    /// Action name.
    pub action: String,
}

impl BindingKey {
    /// Creates a key.
    pub fn new(entity_type: Option<&str>, action: &str) -> Self {
        Self {
            entity_type: entity_type.map(str::to_string),
            action: action.to_string(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_type {
            Some(entity) => write!(f, "{entity}:{}", self.action),
            None => write!(f, "*:{}", self.action),
        }
    }
}

/// Binding tables for every registered service.
#[derive(Debug, Default, Clone)]
pub struct PolicyBindings {
    services: HashMap<ServiceName, HashMap<BindingKey, String>>,
}

impl PolicyBindings {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `(entity_type, action)` in `service` to `policy`.
    pub fn bind(
        &mut self,
        service: &ServiceName,
        entity_type: Option<&str>,
        action: &str,
        policy: impl Into<String>,
    ) {
        let key = BindingKey::new(entity_type, action);
        let policy = policy.into();
        let table = self.services.entry(service.clone()).or_default();
        if let Some(previous) = table.insert(key.clone(), policy.clone()) {
            if previous != policy {
                warn!(service = %service, binding = %key, previous = %previous, policy = %policy, "binding replaced");
            }
        }
    }

    /// Adds a declared binding.
    pub fn bind_decl(&mut self, service: &ServiceName, decl: &BindingDecl) {
        self.bind(service, decl.entity_type.as_deref(), &decl.action, decl.policy.clone());
    }

    /// Replaces every binding of `service` with `decls`.
    pub fn replace_service<'a, I>(&mut self, service: &ServiceName, decls: I)
    where
        I: IntoIterator<Item = &'a BindingDecl>,
    {
        self.services.remove(service);
        for decl in decls {
            self.bind_decl(service, decl);
        }
    }

    /// The policy bound to `(entity_type, action)` in `service`.
    pub fn resolve(&self, service: &ServiceName, entity_type: Option<&str>, action: &str) -> Option<&str> {
        self.services
            .get(service)?
            .get(&BindingKey::new(entity_type, action))
            .map(String::as_str)
    }

    /// Bindings of one service.
    pub fn for_service(&self, service: &ServiceName) -> Vec<(&BindingKey, &str)> {
        let mut bindings: Vec<_> = self
            .services
            .get(service)
            .map(|table| table.iter().map(|(k, v)| (k, v.as_str())).collect())
            .unwrap_or_default();
        bindings.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        bindings
    }

    /// Total number of bindings.
    pub fn len(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
