//! Custos Server - HTTP admin surface for the authorization engine
//!
//! The server exposes health and metrics endpoints plus a small admin API
//! for operators. Admin requests are authorized by the same engine they
//! administer, under the server's own service identity (see
//! [`admin_manifest`]).
//!
//! # Endpoints
//!
//! | Method | Path                        | Action          |
//! |--------|-----------------------------|-----------------|
//! | GET    | `/health`                   | none            |
//! | GET    | `/metrics`                  | none            |
//! | GET    | `/admin/policies`           | `list_policies` |
//! | POST   | `/admin/cache/refresh`      | `refresh_cache` |
//! | POST   | `/admin/cache/refresh/bulk` | `refresh_cache` |
//!
//! The caller is identified by a header set by an authenticating proxy
//! (`x-custos-user` by default). Denials answer `403 {"error":"forbidden"}`
//! without the reason; an unreachable attribute store answers `503`.
//!
//! # Example Usage
//!
//! ```bash
//! $ custos-server --config /etc/custos/custos.toml
//!
//! $ CUSTOS__SERVER__HTTP_ADDR=127.0.0.1:9000 custos-server
//! ```

#![doc(html_root_url = "https://docs.rs/custos-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod admin_manifest;
pub mod error;
pub mod guard;
pub mod routes;
pub mod server;

pub use admin_manifest::{admin_manifest, register_manifests};
pub use error::{ErrorResponse, ServerError, ServerResult};
pub use guard::{caller_id, enforce};
pub use routes::AdminApi;
pub use server::AdminServer;

/// Server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
