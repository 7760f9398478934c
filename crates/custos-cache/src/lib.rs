//! # Custos Cache
//!
//! Per-user, per-service cache of [`AttributeBundle`]s.
//!
//! The cache is a shared resource read by every authorization request.
//! Entries are keyed by `(user_id, service)` and expire after a TTL chosen
//! by the writer. Callers treat any cache error as a miss, so an
//! unavailable cache costs latency but never a decision.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use custos_cache::{AttributeCache, CacheConfig, MemoryAttributeCache};
//! use custos_core::AttributeBundle;
//!
//! # tokio_test::block_on(async {
//! let cache = MemoryAttributeCache::new(CacheConfig::default());
//! let bundle = AttributeBundle::new("alice", "billing_api").with_role("billing_admin");
//!
//! cache.put(&bundle, Duration::from_secs(60)).await.unwrap();
//! let hit = cache.get(&bundle.user_id, &bundle.service).await.unwrap();
//! assert!(hit.is_some());
//! # });
//! ```
//!
//! [`AttributeBundle`]: custos_core::AttributeBundle

#![doc(html_root_url = "https://docs.rs/custos-cache/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;
mod config;
mod error;
mod memory;

pub use cache::{AttributeCache, CacheKey, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryAttributeCache;
