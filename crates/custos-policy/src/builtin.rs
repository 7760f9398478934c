//! Built-in policies.

use std::fmt;

use custos_core::AttributeValue;

use crate::context::{PolicyContext, MAX_DEPTH};
use crate::error::{PolicyError, PolicyResult};
use crate::policy::{Policy, PolicyKind, Verdict};

macro_rules! unit_policy {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            name: String,
        }

        impl $name {
            /// Creates the policy under `name`.
            pub fn new(name: impl Into<String>) -> Self {
                Self { name: name.into() }
            }
        }
    };
}

unit_policy!(
    /// Grants every request.
    AlwaysAllow
);

unit_policy!(
    /// Denies every request.
    AlwaysDeny
);

unit_policy!(
    /// Grants any user known to the store and flagged active.
    AuthenticatedOnly
);

unit_policy!(
    /// Grants when the target's owner is the requesting user.
    OwnershipCheck
);

impl Policy for AlwaysAllow {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AlwaysAllow
    }

    fn evaluate(&self, _ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        Ok(Verdict::allow("always allowed"))
    }
}

impl Policy for AlwaysDeny {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AlwaysDeny
    }

    fn evaluate(&self, _ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        Ok(Verdict::deny("always denied"))
    }
}

impl Policy for AuthenticatedOnly {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AuthenticatedOnly
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        Ok(Verdict::from_bool(
            ctx.bundle.authenticated,
            "user is authenticated",
            "user is unknown or inactive",
        ))
    }
}

impl Policy for OwnershipCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Ownership
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        let Some(target) = ctx.target else {
            return Ok(Verdict::deny("no target object to check ownership of"));
        };
        Ok(match target.owner() {
            Some(owner) if owner == ctx.user_id() => Verdict::allow("user owns the object"),
            Some(_) => Verdict::deny("object is owned by another user"),
            None => Verdict::deny("object has no owner"),
        })
    }

    fn explain(&self) -> String {
        "target owner equals the requesting user".to_string()
    }
}

/// Grants when the user holds any of the listed roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMembership {
    name: String,
    roles: Vec<String>,
}

impl RoleMembership {
    /// Creates the policy.
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The accepted roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Policy for RoleMembership {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::RoleMembership
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        let matched = ctx
            .bundle
            .first_matching_role(self.roles.iter().map(String::as_str));
        Ok(match matched {
            Some(role) => Verdict::allow(format!("user holds active role '{role}'")),
            None => Verdict::deny(format!(
                "no matching active role (requires one of: {})",
                self.roles.join(", ")
            )),
        })
    }

    fn explain(&self) -> String {
        format!("holds any of roles [{}]", self.roles.join(", "))
    }
}

/// Grants when a user attribute equals a value, or for list attributes,
/// contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEquals {
    name: String,
    attribute: String,
    value: AttributeValue,
}

impl AttributeEquals {
    /// Creates the policy.
    pub fn new(name: impl Into<String>, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl Policy for AttributeEquals {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AttributeEquals
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        Ok(match ctx.bundle.attribute(&self.attribute) {
            Some(actual) if actual.matches(&self.value) => {
                Verdict::allow(format!("attribute '{}' is {}", self.attribute, self.value))
            }
            Some(_) => Verdict::deny(format!("attribute '{}' does not match", self.attribute)),
            None => Verdict::deny(format!("attribute '{}' is not set", self.attribute)),
        })
    }

    fn explain(&self) -> String {
        format!("user attribute {} = {}", self.attribute, self.value)
    }
}

/// Grants when an attribute of the target object equals a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAttributeEquals {
    name: String,
    target_attribute: String,
    value: AttributeValue,
}

impl TargetAttributeEquals {
    /// Creates the policy.
    pub fn new(
        name: impl Into<String>,
        target_attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            name: name.into(),
            target_attribute: target_attribute.into(),
            value: value.into(),
        }
    }
}

impl Policy for TargetAttributeEquals {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::TargetAttributeEquals
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        let actual = ctx.target.and_then(|target| target.attribute(&self.target_attribute));
        Ok(match actual {
            Some(actual) if actual.matches(&self.value) => Verdict::allow(format!(
                "target attribute '{}' is {}",
                self.target_attribute, self.value
            )),
            _ => Verdict::deny(format!(
                "target attribute '{}' is not {}",
                self.target_attribute, self.value
            )),
        })
    }

    fn explain(&self) -> String {
        format!("target attribute {} = {}", self.target_attribute, self.value)
    }
}

/// Grants when a user attribute matches an attribute of the target object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatchesTarget {
    name: String,
    attribute: String,
    target_attribute: String,
}

impl AttributeMatchesTarget {
    /// Creates the policy.
    pub fn new(
        name: impl Into<String>,
        attribute: impl Into<String>,
        target_attribute: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
            target_attribute: target_attribute.into(),
        }
    }
}

impl Policy for AttributeMatchesTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AttributeMatchesTarget
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        let user_value = ctx.bundle.attribute(&self.attribute);
        let target_value = ctx.target.and_then(|target| target.attribute(&self.target_attribute));
        Ok(match (user_value, target_value) {
            (Some(user_value), Some(target_value)) if user_value.matches(&target_value) => {
                Verdict::allow(format!(
                    "attribute '{}' matches target '{}'",
                    self.attribute, self.target_attribute
                ))
            }
            (None, _) => Verdict::deny(format!("attribute '{}' is not set", self.attribute)),
            _ => Verdict::deny(format!(
                "attribute '{}' does not match target '{}'",
                self.attribute, self.target_attribute
            )),
        })
    }

    fn explain(&self) -> String {
        format!("user attribute {} matches target {}", self.attribute, self.target_attribute)
    }
}

fn evaluate_member(
    composite: &str,
    member: &str,
    ctx: &PolicyContext<'_>,
) -> PolicyResult<Verdict> {
    if ctx.depth() >= MAX_DEPTH {
        return Err(PolicyError::DepthExceeded {
            policy: composite.to_string(),
            depth: MAX_DEPTH,
        });
    }
    let registry = ctx
        .registry()
        .ok_or_else(|| PolicyError::MissingRegistry(composite.to_string()))?;
    let policy = registry.lookup(member).ok_or_else(|| PolicyError::UnknownMember {
        policy: composite.to_string(),
        member: member.to_string(),
    })?;
    policy.evaluate(&ctx.nested())
}

/// Grants when any of the named policies grants.
///
/// Members are resolved by name from the registry at evaluation time and
/// short-circuit on the first grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyOf {
    name: String,
    members: Vec<String>,
}

impl AnyOf {
    /// Creates the policy.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl Policy for AnyOf {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AnyOf
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        let mut reasons = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let verdict = evaluate_member(&self.name, member, ctx)?;
            if verdict.allowed {
                return Ok(Verdict::allow(format!("{member}: {}", verdict.reason)));
            }
            reasons.push(format!("{member}: {}", verdict.reason));
        }
        Ok(Verdict::deny(reasons.join("; ")))
    }

    fn explain(&self) -> String {
        format!("any of [{}]", self.members.join(", "))
    }
}

/// Grants when every named policy grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllOf {
    name: String,
    members: Vec<String>,
}

impl AllOf {
    /// Creates the policy.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl Policy for AllOf {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::AllOf
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        if self.members.is_empty() {
            return Ok(Verdict::deny("composite policy has no members"));
        }
        let mut reasons = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let verdict = evaluate_member(&self.name, member, ctx)?;
            if !verdict.allowed {
                return Ok(Verdict::deny(format!("{member}: {}", verdict.reason)));
            }
            reasons.push(format!("{member}: {}", verdict.reason));
        }
        Ok(Verdict::allow(reasons.join("; ")))
    }

    fn explain(&self) -> String {
        format!("all of [{}]", self.members.join(", "))
    }
}

type PredicateFn = dyn Fn(&PolicyContext<'_>) -> PolicyResult<bool> + Send + Sync;

/// A policy backed by a closure.
///
/// For rules that do not fit a built-in kind. The closure must be pure.
pub struct Predicate {
    name: String,
    description: String,
    check: Box<PredicateFn>,
}

impl Predicate {
    /// Creates the policy.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&PolicyContext<'_>) -> PolicyResult<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: "custom predicate".to_string(),
            check: Box::new(check),
        }
    }

    /// Sets the description returned by [`Policy::explain`].
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Policy for Predicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Custom
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyResult<Verdict> {
        let allowed = (self.check)(ctx)?;
        Ok(Verdict::from_bool(
            allowed,
            format!("predicate '{}' granted", self.name),
            format!("predicate '{}' denied", self.name),
        ))
    }

    fn explain(&self) -> String {
        self.description.clone()
    }
}
