//! # Custos Policy
//!
//! Named authorization policies and the tables that select them.
//!
//! A [`Policy`] is a pure, synchronous predicate over an
//! [`AttributeBundle`], an optional target [`Resource`] and the requested
//! action. Policies are registered once at startup into a
//! [`PolicyRegistry`] and selected per `(entity type, action)` through
//! [`PolicyBindings`].
//!
//! ## Built-in policies
//!
//! | Kind | Grants when |
//! |------|-------------|
//! | [`AlwaysAllow`] | always |
//! | [`AlwaysDeny`] | never |
//! | [`AuthenticatedOnly`] | the user is known and active |
//! | [`OwnershipCheck`] | the target's owner is the user |
//! | [`RoleMembership`] | the user holds any listed role |
//! | [`AttributeEquals`] | a user attribute has a value |
//! | [`TargetAttributeEquals`] | a target attribute has a value |
//! | [`AttributeMatchesTarget`] | a user attribute matches a target attribute |
//! | [`AnyOf`] / [`AllOf`] | any / every named policy grants |
//! | [`Predicate`] | a closure registered in code returns true |
//!
//! ## Example
//!
//! ```rust
//! use custos_core::{AttributeBundle, Entity};
//! use custos_policy::{PolicyContext, PolicyRegistry, RoleMembership};
//!
//! let mut registry = PolicyRegistry::new();
//! registry.register(RoleMembership::new("billing_staff", ["billing_admin", "billing_viewer"]));
//!
//! let bundle = AttributeBundle::new("alice", "billing_api").with_role("billing_admin");
//! let invoice = Entity::new("invoice", "inv-1");
//! let ctx = PolicyContext::new(&bundle, Some(&invoice), "view").with_registry(&registry);
//!
//! let policy = registry.lookup("billing_staff").unwrap();
//! assert!(policy.evaluate(&ctx).unwrap().allowed);
//! ```
//!
//! [`AttributeBundle`]: custos_core::AttributeBundle
//! [`Resource`]: custos_core::Resource

#![doc(html_root_url = "https://docs.rs/custos-policy/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bindings;
mod builtin;
mod context;
mod error;
mod policy;
mod registry;
mod spec;

pub use bindings::{BindingKey, PolicyBindings};
pub use builtin::{
    AllOf, AlwaysAllow, AlwaysDeny, AnyOf, AttributeEquals, AttributeMatchesTarget,
    AuthenticatedOnly, OwnershipCheck, Predicate, RoleMembership, TargetAttributeEquals,
};
pub use context::PolicyContext;
pub use error::{PolicyError, PolicyResult};
pub use policy::{Policy, PolicyKind, Verdict};
pub use registry::{PolicyDescription, PolicyRegistry};
pub use spec::build_policy;
