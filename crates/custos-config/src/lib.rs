//! Typed configuration for Custos.
//!
//! This crate provides the configuration of the Custos admin server and
//! authorization core with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//! - Service manifest files read once at startup
//!
//! # Example
//!
//! ```no_run
//! use custos_config::ConfigLoader;
//!
//! # fn main() -> Result<(), custos_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("custos.toml")?
//!     .with_env_prefix("CUSTOS")
//!     .load()?;
//!
//! let manifests = config.load_manifests()?;
//! println!("{} services, cache TTL {}s", manifests.len(), config.cache.ttl_secs);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! manifests = ["manifests/billing.toml", "manifests/inventory.json"]
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//! service_name = "custos"
//! identity_header = "x-custos-user"
//! max_body_bytes = 65536
//!
//! [cache]
//! enabled = true
//! ttl_secs = 86400
//! op_timeout_ms = 250
//! max_entries = 100000
//!
//! [store]
//! op_timeout_ms = 2000
//!
//! [engine]
//! auto_refresh = true
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY`, for example:
//!
//! - `CUSTOS__CACHE__TTL_SECS=300`
//! - `CUSTOS__SERVER__SERVICE_NAME=gatekeeper`
//! - `CUSTOS__MANIFESTS=/etc/custos/billing.toml,/etc/custos/inventory.toml`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{load_manifest, CustosConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::*;
