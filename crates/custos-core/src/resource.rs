//! Target objects of authorization requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;

/// An object an action is performed on.
///
/// Implement this for domain types that are protected by policies. The
/// entity type selects the policy binding; the owner and attributes are
/// what ownership and attribute policies inspect.
pub trait Resource: Send + Sync {
    /// The entity type used to resolve policy bindings, e.g. `invoice`.
    fn entity_type(&self) -> &str;

    /// The id of the owning user, if the object has one.
    fn owner(&self) -> Option<&str> {
        None
    }

    /// A named attribute of the object.
    fn attribute(&self, _name: &str) -> Option<AttributeValue> {
        None
    }
}

/// A generic resource described by data rather than a domain type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type.
    pub entity_type: String,
    /// Object identifier.
    pub id: String,
    /// Owning user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Object attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Entity {
    /// Creates an entity without owner or attributes.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            owner: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

impl Resource for Entity {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.get(name).cloned()
    }
}

impl<T: Resource + ?Sized> Resource for &T {
    fn entity_type(&self) -> &str {
        (**self).entity_type()
    }

    fn owner(&self) -> Option<&str> {
        (**self).owner()
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        (**self).attribute(name)
    }
}
