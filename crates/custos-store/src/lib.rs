//! # Custos Store
//!
//! The durable record of users, services, role assignments and attributes
//! that attribute bundles are computed from.
//!
//! The authorization core only talks to the [`AttributeStore`] trait. This
//! crate ships [`MemoryAttributeStore`], an in-process backend suitable for
//! tests, demos and single-node deployments; a relational backend
//! implements the same trait.
//!
//! # Write validation
//!
//! Writes are checked against the service manifest before they touch
//! storage: unknown services, undeclared roles, undeclared attributes and
//! attribute values of the wrong kind are all rejected.

#![doc(html_root_url = "https://docs.rs/custos-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod memory;
mod store;

pub use error::{BulkFailure, StoreError, StoreResult};
pub use memory::MemoryAttributeStore;
pub use store::{AttributeStore, BoxFuture, RoleGrant};
