//! # Custos
//!
//! **Attribute-cached authorization for multi-service platforms**
//!
//! Custos decides whether a user may perform an action, optionally on a
//! target object, within a service. It provides:
//!
//! - **Declarative services**: each service registers a manifest of roles,
//!   attribute schema, named policies and `(entity, action)` bindings
//! - **Composable policies**: role membership, ownership, attribute checks
//!   and `any_of` / `all_of` combinators, plus policies written in code
//! - **Cached attribute bundles**: a user's roles and attributes per
//!   service, cached with a TTL and invalidated on every mutation
//! - **Fail closed**: missing bindings, unknown policies and store outages
//!   all deny
//!
//! ## Quick Start
//!
//! ```rust
//! use custos::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let custos = Custos::builder()
//!     .manifest(custos::core::fixtures::billing_manifest())
//!     .build()
//!     .await?;
//!
//! custos.admin().upsert_user(User::new("alice", "Alice")).await?;
//! custos
//!     .admin()
//!     .assign_role(RoleGrant::new("alice", "billing_api", "billing_viewer", "root"))
//!     .await?;
//!
//! let invoice = Entity::new("invoice", "inv-1");
//! let decision = custos
//!     .authorize(&"alice".into(), &"billing_api".into(), "view", Some(&invoice))
//!     .await;
//! assert!(decision.allow);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! authorize(user, service, action, target)
//!     → binding lookup → policy lookup → bundle (cache, else store)
//!     → policy evaluation → Decision
//!
//! admin write → store → invalidate cached bundle
//! ```

#![doc(html_root_url = "https://docs.rs/custos/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use custos_core as core;

// Re-export the attribute store
pub use custos_store as store;

// Re-export the bundle cache
pub use custos_cache as cache;

// Re-export policies
pub use custos_policy as policy;

// Re-export the engine
pub use custos_authz as authz;

// Re-export configuration
pub use custos_config as config;

// Re-export telemetry
pub use custos_telemetry as telemetry;

pub use custos_authz::{Custos, CustosBuilder};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use custos::prelude::*;
/// ```
pub mod prelude {
    pub use custos_core::{
        AttributeBundle, AttributeKind, AttributeValue, BindingDecl, Decision, DecisionCode, Entity,
        PolicySpec, Resource, RoleDecl, ServiceManifest, ServiceName, User, UserId,
    };

    pub use custos_store::{AttributeStore, MemoryAttributeStore, RoleGrant, StoreError};

    pub use custos_cache::{AttributeCache, CacheConfig, MemoryAttributeCache};

    pub use custos_policy::{Policy, PolicyContext, PolicyKind, PolicyRegistry, PolicyResult, Verdict};

    pub use custos_authz::{
        AccessAdmin, AuthzError, AuthzResult, Custos, CustosBuilder, EngineConfig, InvalidationNotifier,
        PolicyEngine,
    };

    pub use custos_config::{ConfigLoader, CustosConfig};
}
