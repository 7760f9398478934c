//! The attribute bundle: the materialized view policies evaluate against.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::ids::{ServiceName, UserId};

/// Roles and attributes of one user within one service.
///
/// Bundles are derived from the attribute store on cache miss and are
/// read-only to policies. They are serialized as JSON when cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeBundle {
    /// The user this bundle describes.
    pub user_id: UserId,
    /// The service this bundle is scoped to.
    pub service: ServiceName,
    /// Whether the user is known and active.
    #[serde(default)]
    pub authenticated: bool,
    /// Names of active roles.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Attribute values keyed by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// When the bundle was computed.
    pub computed_at: DateTime<Utc>,
    /// Earliest expiry among the roles in this bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl AttributeBundle {
    /// Creates an empty, unauthenticated bundle computed now.
    pub fn new(user_id: impl Into<UserId>, service: impl Into<ServiceName>) -> Self {
        Self {
            user_id: user_id.into(),
            service: service.into(),
            authenticated: false,
            roles: BTreeSet::new(),
            attributes: BTreeMap::new(),
            computed_at: Utc::now(),
            valid_until: None,
        }
    }

    /// Marks the bundle as belonging to an authenticated, active user.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns true if the bundle holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns the first of `roles` this bundle holds.
    pub fn first_matching_role<'a, I>(&self, roles: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        roles.into_iter().find(|role| self.roles.contains(*role))
    }

    /// Returns an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Returns true if roles and attributes match `other`, ignoring timestamps.
    pub fn same_grants(&self, other: &Self) -> bool {
        self.user_id == other.user_id
            && self.service == other.service
            && self.authenticated == other.authenticated
            && self.roles == other.roles
            && self.attributes == other.attributes
    }

    /// Time-to-live for this bundle, bounded by `max` and by the earliest
    /// role expiry. Returns zero if a role has already expired.
    pub fn ttl(&self, max: Duration, now: DateTime<Utc>) -> Duration {
        match self.valid_until {
            Some(until) => {
                let remaining = (until - now).to_std().unwrap_or(Duration::ZERO);
                remaining.min(max)
            }
            None => max,
        }
    }
}
