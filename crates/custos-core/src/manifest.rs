//! Service manifests.
//!
//! Each service declares, once at startup, the roles it understands, the
//! attributes it stores (with their kinds), any policies it wants built
//! from the built-in kinds, and the bindings from `(entity type, action)`
//! to policy names.
//!
//! # Example
//!
//! ```
//! use custos_core::ServiceManifest;
//!
//! let manifest = ServiceManifest::from_toml_str(r#"
//!     name = "billing_api"
//!     roles = ["billing_admin", { name = "auditor", global = true }]
//!
//!     [attributes]
//!     budget_limit = "integer"
//!
//!     [[policies]]
//!     name = "billing_staff"
//!     kind = "role_membership"
//!     roles = ["billing_admin"]
//!
//!     [[bindings]]
//!     entity_type = "invoice"
//!     action = "view"
//!     policy = "billing_staff"
//! "#).unwrap();
//!
//! assert_eq!(manifest.name.as_str(), "billing_api");
//! assert!(manifest.role("auditor").unwrap().global);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeKind, AttributeSchema, AttributeValue};
use crate::error::{SchemaError, SchemaResult};
use crate::ids::ServiceName;

/// A role declared by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RoleDeclRepr")]
pub struct RoleDecl {
    /// Role name.
    pub name: String,
    /// Global roles apply to the user in every service.
    pub global: bool,
}

impl RoleDecl {
    /// A service-scoped role.
    pub fn scoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global: false,
        }
    }

    /// A global role.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleDeclRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        global: bool,
    },
}

impl From<RoleDeclRepr> for RoleDecl {
    fn from(repr: RoleDeclRepr) -> Self {
        match repr {
            RoleDeclRepr::Name(name) => Self::scoped(name),
            RoleDeclRepr::Full { name, global } => Self { name, global },
        }
    }
}

/// Declarative configuration of a built-in policy kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicySpec {
    /// Always grants.
    AlwaysAllow,
    /// Always denies.
    AlwaysDeny,
    /// Grants to any known, active user.
    AuthenticatedOnly,
    /// Grants when the target's owner is the requesting user.
    Ownership,
    /// Grants when the user holds any of `roles`.
    RoleMembership {
        /// Accepted roles.
        roles: Vec<String>,
    },
    /// Grants when the user's `attribute` equals (or, for lists, contains) `value`.
    AttributeEquals {
        /// User attribute name.
        attribute: String,
        /// Expected value.
        value: AttributeValue,
    },
    /// Grants when the target's `target_attribute` equals `value`.
    TargetAttributeEquals {
        /// Target attribute name.
        target_attribute: String,
        /// Expected value.
        value: AttributeValue,
    },
    /// Grants when the user's `attribute` matches the target's `target_attribute`.
    AttributeMatchesTarget {
        /// User attribute name.
        attribute: String,
        /// Target attribute name.
        target_attribute: String,
    },
    /// Grants when any named policy grants.
    AnyOf {
        /// Names of registered policies.
        policies: Vec<String>,
    },
    /// Grants when every named policy grants.
    AllOf {
        /// Names of registered policies.
        policies: Vec<String>,
    },
}

/// A named policy declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecl {
    /// Registry name.
    pub name: String,
    /// Policy kind and parameters.
    #[serde(flatten)]
    pub spec: PolicySpec,
}

/// Binding from `(entity type, action)` to a policy name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDecl {
    /// Entity type; `None` binds an action that has no target object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// Action name.
    pub action: String,
    /// Policy name.
    pub policy: String,
}

impl BindingDecl {
    /// Binds an action on an entity type.
    pub fn new(entity_type: impl Into<String>, action: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            action: action.into(),
            policy: policy.into(),
        }
    }

    /// Binds an action with no target object.
    pub fn untyped(action: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            entity_type: None,
            action: action.into(),
            policy: policy.into(),
        }
    }
}

/// Everything a service declares at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceManifest {
    /// Service name.
    pub name: ServiceName,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared roles.
    #[serde(default)]
    pub roles: Vec<RoleDecl>,
    /// Declared attributes and their kinds.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeKind>,
    /// Policies to build from built-in kinds.
    #[serde(default)]
    pub policies: Vec<PolicyDecl>,
    /// Policy bindings.
    #[serde(default)]
    pub bindings: Vec<BindingDecl>,
}

impl ServiceManifest {
    /// Creates an empty manifest.
    pub fn new(name: impl Into<ServiceName>) -> Self {
        Self {
            name: name.into(),
            description: None,
            roles: Vec::new(),
            attributes: BTreeMap::new(),
            policies: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Parses and validates a TOML manifest.
    pub fn from_toml_str(content: &str) -> SchemaResult<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| SchemaError::invalid_manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parses and validates a JSON manifest.
    pub fn from_json_str(content: &str) -> SchemaResult<Self> {
        let manifest: Self = serde_json::from_str(content)
            .map_err(|e| SchemaError::invalid_manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Adds a role.
    pub fn with_role(mut self, role: RoleDecl) -> Self {
        self.roles.push(role);
        self
    }

    /// Declares an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.insert(name.into(), kind);
        self
    }

    /// Declares a policy.
    pub fn with_policy(mut self, name: impl Into<String>, spec: PolicySpec) -> Self {
        self.policies.push(PolicyDecl {
            name: name.into(),
            spec,
        });
        self
    }

    /// Adds a binding.
    pub fn with_binding(mut self, binding: BindingDecl) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Looks up a declared role.
    pub fn role(&self, name: &str) -> Option<&RoleDecl> {
        self.roles.iter().find(|role| role.name == name)
    }

    /// Returns the attribute schema.
    pub fn schema(&self) -> AttributeSchema {
        self.attributes
            .iter()
            .map(|(name, kind)| (name.clone(), *kind))
            .collect()
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.name.is_blank() {
            return Err(SchemaError::invalid_manifest("service name must not be empty"));
        }

        let mut roles = HashSet::new();
        for role in &self.roles {
            if role.name.trim().is_empty() {
                return Err(SchemaError::invalid_manifest(format!(
                    "{}: role name must not be empty",
                    self.name
                )));
            }
            if !roles.insert(role.name.as_str()) {
                return Err(SchemaError::invalid_manifest(format!(
                    "{}: duplicate role '{}'",
                    self.name, role.name
                )));
            }
        }

        let mut policies = HashSet::new();
        for decl in &self.policies {
            if !policies.insert(decl.name.as_str()) {
                return Err(SchemaError::invalid_manifest(format!(
                    "{}: duplicate policy '{}'",
                    self.name, decl.name
                )));
            }
            if let PolicySpec::AnyOf { policies: members } | PolicySpec::AllOf { policies: members } =
                &decl.spec
            {
                if members.is_empty() {
                    return Err(SchemaError::invalid_manifest(format!(
                        "{}: composite policy '{}' has no members",
                        self.name, decl.name
                    )));
                }
            }
        }

        for binding in &self.bindings {
            if binding.action.trim().is_empty() || binding.policy.trim().is_empty() {
                return Err(SchemaError::invalid_manifest(format!(
                    "{}: bindings need an action and a policy",
                    self.name
                )));
            }
        }

        Ok(())
    }
}
