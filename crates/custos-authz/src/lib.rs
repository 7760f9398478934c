//! # Custos Authz
//!
//! The authorization decision and attribute caching core.
//!
//! ```text
//!   user_id, service, action, target
//!              │
//!   ┌──────────▼──────────┐   binding    ┌────────────────┐
//!   │    PolicyEngine     │─────────────▶│ PolicyBindings │
//!   │                     │   policy     ├────────────────┤
//!   │                     │─────────────▶│ PolicyRegistry │
//!   └──────────┬──────────┘              └────────────────┘
//!              │ bundle
//!   ┌──────────▼──────────┐    miss      ┌────────────────┐
//!   │   RefreshPipeline   │─────────────▶│ AttributeStore │
//!   └──────────┬──────────┘              └────────▲───────┘
//!              │ get / put                        │ writes
//!   ┌──────────▼──────────┐  invalidate  ┌────────┴───────┐
//!   │   AttributeCache    │◀─────────────│  AccessAdmin   │
//!   └─────────────────────┘  (notifier)  └────────────────┘
//! ```
//!
//! Decisions fail closed: a missing binding, a missing policy, an
//! unreachable store or a failing policy all deny. An unreachable cache
//! only costs a store read.
//!
//! # Example
//!
//! ```rust
//! use custos_authz::Custos;
//! use custos_core::{fixtures, Entity, ServiceName, User, UserId};
//! use custos_store::RoleGrant;
//!
//! # tokio_test::block_on(async {
//! let custos = Custos::builder()
//!     .manifest(fixtures::billing_manifest())
//!     .build()
//!     .await
//!     .unwrap();
//!
//! custos.admin().upsert_user(User::new("alice", "Alice")).await.unwrap();
//! custos
//!     .admin()
//!     .assign_role(RoleGrant::new("alice", "billing_api", "billing_admin", "root"))
//!     .await
//!     .unwrap();
//!
//! let invoice = Entity::new("invoice", "inv-42");
//! let decision = custos
//!     .authorize(&UserId::new("alice"), &ServiceName::new("billing_api"), "view", Some(&invoice))
//!     .await;
//! assert!(decision.allow);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod config;
mod custos;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod refresh;

pub use admin::AccessAdmin;
pub use config::EngineConfig;
pub use custos::{Custos, CustosBuilder};
pub use engine::PolicyEngine;
pub use error::{AuthzError, AuthzResult};
pub use notifier::{InvalidationNotifier, RefreshOutcome, UserRefresh};
pub use refresh::RefreshPipeline;
