//! # Custos Core
//!
//! Core domain types for the Custos authorization platform.
//!
//! This crate provides the vocabulary shared by every other Custos crate:
//!
//! - [`UserId`] / [`ServiceName`] - identifiers for users and consuming services
//! - [`AttributeValue`] / [`AttributeKind`] / [`AttributeSchema`] - typed user attributes
//! - [`RoleAssignment`] - a user's grant of a role, with expiry and an active flag
//! - [`AttributeBundle`] - the materialized roles + attributes a policy sees
//! - [`ServiceManifest`] - the roles, attribute schema, policies and bindings a service declares
//! - [`Resource`] / [`Entity`] - target objects of an authorization request
//! - [`Decision`] / [`DecisionCode`] - the outcome of an authorization request

#![doc(html_root_url = "https://docs.rs/custos-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod assignment;
mod attribute;
mod bundle;
mod decision;
mod error;
pub mod fixtures;
mod ids;
pub mod manifest;
mod resource;

pub use assignment::{RoleAssignment, User};
pub use attribute::{AttributeKind, AttributeSchema, AttributeValue};
pub use bundle::AttributeBundle;
pub use decision::{Decision, DecisionCode};
pub use error::{SchemaError, SchemaResult};
pub use ids::{ServiceName, UserId};
pub use manifest::{BindingDecl, PolicyDecl, PolicySpec, RoleDecl, ServiceManifest};
pub use resource::{Entity, Resource};

use std::future::Future;
use std::pin::Pin;

/// A boxed future, used so stores and caches can be shared as trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
