//! Authorization of admin requests.

use custos_authz::PolicyEngine;
use custos_core::{Decision, Resource, ServiceName, UserId};
use http::HeaderMap;
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Reads the caller's user id from `header`.
///
/// The header is expected to be set by an authenticating proxy in front of
/// the server; its value is trusted as is.
pub fn caller_id(headers: &HeaderMap, header: &str) -> ServerResult<UserId> {
    let value = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ServerError::Unauthenticated)?;
    Ok(UserId::new(value))
}

/// Decides whether `user_id` may perform `action`, as a request guard.
///
/// A denial becomes [`ServerError::Forbidden`] and a store outage
/// [`ServerError::Unavailable`]. The decision's reason is logged, never
/// returned to the caller.
pub async fn enforce(
    engine: &PolicyEngine,
    user_id: &UserId,
    service: &ServiceName,
    action: &str,
    target: Option<&dyn Resource>,
) -> ServerResult<Decision> {
    let decision = engine.authorize(user_id, service, action, target).await;
    if decision.allow {
        return Ok(decision);
    }

    debug!(
        user_id = %user_id,
        action = %action,
        code = %decision.code,
        reason = %decision.reason,
        "admin request rejected"
    );

    if decision.is_unavailable() {
        Err(ServerError::unavailable(decision.reason))
    } else {
        Err(ServerError::Forbidden)
    }
}
