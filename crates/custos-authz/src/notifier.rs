//! Cache invalidation.

use std::sync::Arc;

use custos_core::{ServiceName, UserId};
use custos_telemetry::record_invalidation;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{AuthzError, AuthzResult};
use crate::refresh::{cache_call, store_call, RefreshPipeline};

/// Attempts per invalidation before giving up.
const INVALIDATE_ATTEMPTS: usize = 3;

/// Result of a forced refresh for one `(user, service)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    /// The user.
    pub user_id: UserId,
    /// The service.
    pub service: ServiceName,
    /// Whether the cache entry was removed.
    pub invalidated: bool,
    /// Whether a fresh bundle was written back.
    pub refreshed: bool,
    /// What went wrong, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshOutcome {
    /// Returns true if every requested step succeeded.
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a forced refresh of one user across every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRefresh {
    /// The user.
    pub user_id: UserId,
    /// Number of cached bundles removed.
    pub invalidated: usize,
    /// Per-service rebuilds; empty unless the refresh was eager.
    pub outcomes: Vec<RefreshOutcome>,
}

/// Removes stale bundles after mutations, and forces refreshes on demand.
///
/// Must be called in the same operation as the store write it follows.
#[derive(Debug, Clone)]
pub struct InvalidationNotifier {
    pipeline: Arc<RefreshPipeline>,
}

impl InvalidationNotifier {
    /// Creates a notifier over the pipeline's cache.
    pub fn new(pipeline: Arc<RefreshPipeline>) -> Self {
        Self { pipeline }
    }

    /// Invalidates the bundle of `user_id` in `service`.
    ///
    /// Retries a failing cache a few times before reporting
    /// `CacheUnavailable`.
    pub async fn notify(&self, user_id: &UserId, service: &ServiceName) -> AuthzResult<usize> {
        let removed = self.invalidate(user_id, Some(service)).await?;
        record_invalidation("pair");
        Ok(removed)
    }

    /// Invalidates every bundle of `user_id`.
    pub async fn notify_user(&self, user_id: &UserId) -> AuthzResult<usize> {
        let removed = self.invalidate(user_id, None).await?;
        record_invalidation("user");
        Ok(removed)
    }

    async fn invalidate(&self, user_id: &UserId, service: Option<&ServiceName>) -> AuthzResult<usize> {
        let cache = self.pipeline.cache();
        let timeout = self.pipeline.config().cache_timeout;
        let mut last_error = None;
        for attempt in 1..=INVALIDATE_ATTEMPTS {
            match cache_call(timeout, cache.invalidate(user_id, service)).await {
                Ok(removed) => return Ok(removed),
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        service = ?service.map(ServiceName::as_str),
                        attempt,
                        error = %e,
                        "cache invalidation failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        let err = last_error.map_or_else(
            || AuthzError::CacheUnavailable("invalidation failed".to_string()),
            AuthzError::from,
        );
        error!(user_id = %user_id, service = ?service.map(ServiceName::as_str), error = %err, "giving up on cache invalidation");
        Err(err)
    }

    /// Invalidates each pair and, when `eager`, rebuilds it from the store.
    ///
    /// Pairs are processed independently; one failure does not stop the rest.
    pub async fn force_refresh(&self, pairs: &[(UserId, ServiceName)], eager: bool) -> Vec<RefreshOutcome> {
        let mut outcomes = Vec::with_capacity(pairs.len());
        for (user_id, service) in pairs {
            outcomes.push(self.force_refresh_pair(user_id, service, eager).await);
        }
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(pairs = pairs.len(), failed, eager, "forced cache refresh");
        outcomes
    }

    /// Forces a refresh of `user_id` in every service.
    ///
    /// Every cached bundle of the user is cleared with one invalidation,
    /// including bundles for services the store no longer lists. Only an
    /// eager refresh reads the service list, to rebuild each bundle.
    pub async fn force_refresh_user(&self, user_id: &UserId, eager: bool) -> AuthzResult<UserRefresh> {
        let invalidated = self.notify_user(user_id).await?;
        let mut refresh = UserRefresh {
            user_id: user_id.clone(),
            invalidated,
            outcomes: Vec::new(),
        };
        if !eager {
            info!(user_id = %user_id, invalidated, "forced cache refresh for user");
            return Ok(refresh);
        }

        let store = self.pipeline.store();
        let services = store_call(self.pipeline.config().store_timeout, store.services()).await?;
        for service in services {
            let mut outcome = RefreshOutcome {
                user_id: user_id.clone(),
                service,
                invalidated: true,
                refreshed: false,
                error: None,
            };
            match self.pipeline.refresh(user_id, &outcome.service).await {
                Ok(_) => outcome.refreshed = true,
                Err(e) => outcome.error = Some(e.to_string()),
            }
            refresh.outcomes.push(outcome);
        }
        let failed = refresh.outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(user_id = %user_id, invalidated, services = refresh.outcomes.len(), failed, "forced cache refresh for user");
        Ok(refresh)
    }

    async fn force_refresh_pair(&self, user_id: &UserId, service: &ServiceName, eager: bool) -> RefreshOutcome {
        let mut outcome = RefreshOutcome {
            user_id: user_id.clone(),
            service: service.clone(),
            invalidated: false,
            refreshed: false,
            error: None,
        };

        match self.notify(user_id, service).await {
            Ok(_) => outcome.invalidated = true,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        }

        if eager {
            match self.pipeline.refresh(user_id, service).await {
                Ok(_) => outcome.refreshed = true,
                Err(e) => outcome.error = Some(e.to_string()),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use custos_cache::{AttributeCache, MemoryAttributeCache};
    use custos_core::{fixtures, User};
    use custos_store::{AttributeStore, MemoryAttributeStore};

    use crate::config::EngineConfig;

    async fn setup() -> (InvalidationNotifier, Arc<RefreshPipeline>, Arc<MemoryAttributeCache>) {
        let store = Arc::new(MemoryAttributeStore::new());
        store.register_service(&fixtures::billing_manifest()).await.unwrap();
        store.register_service(&fixtures::inventory_manifest()).await.unwrap();
        store.upsert_user(User::new("erin", "erin")).await.unwrap();
        let cache = Arc::new(MemoryAttributeCache::default());
        let pipeline = Arc::new(RefreshPipeline::new(store, cache.clone(), EngineConfig::default()));
        (InvalidationNotifier::new(pipeline.clone()), pipeline, cache)
    }

    fn erin() -> UserId {
        UserId::new("erin")
    }

    #[tokio::test]
    async fn test_notify_removes_entry() {
        let (notifier, pipeline, cache) = setup().await;
        let billing = ServiceName::new("billing_api");
        pipeline.refresh(&erin(), &billing).await.unwrap();

        assert_eq!(notifier.notify(&erin(), &billing).await.unwrap(), 1);
        assert!(cache.get(&erin(), &billing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notify_user_removes_all_services() {
        let (notifier, pipeline, cache) = setup().await;
        pipeline.refresh(&erin(), &ServiceName::new("billing_api")).await.unwrap();
        pipeline.refresh(&erin(), &ServiceName::new("inventory_api")).await.unwrap();

        assert_eq!(notifier.notify_user(&erin()).await.unwrap(), 2);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_force_refresh_eager_repopulates() {
        let (notifier, _, cache) = setup().await;
        let billing = ServiceName::new("billing_api");
        let outcomes = notifier.force_refresh(&[(erin(), billing.clone())], true).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[0].refreshed);
        assert!(cache.get(&erin(), &billing).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_force_refresh_user_covers_registered_services() {
        let (notifier, _, cache) = setup().await;
        let refresh = notifier.force_refresh_user(&erin(), true).await.unwrap();
        assert_eq!(refresh.outcomes.len(), 2);
        assert!(refresh.outcomes.iter().all(|o| o.invalidated && o.refreshed));
        assert_eq!(cache.stats().size, 2);
    }

    #[tokio::test]
    async fn test_force_refresh_user_clears_unlisted_services() {
        let (notifier, pipeline, cache) = setup().await;
        let billing = ServiceName::new("billing_api");
        let retired = ServiceName::new("retired_api");
        let mut orphan = pipeline.refresh(&erin(), &billing).await.unwrap();
        orphan.service = retired.clone();
        cache.put(&orphan, Duration::from_secs(300)).await.unwrap();

        let refresh = notifier.force_refresh_user(&erin(), false).await.unwrap();
        assert_eq!(refresh.invalidated, 2);
        assert!(refresh.outcomes.is_empty());
        assert!(cache.get(&erin(), &retired).await.unwrap().is_none());
        assert!(cache.get(&erin(), &billing).await.unwrap().is_none());
    }

    #[test]
    fn test_outcome_serialization_omits_empty_error() {
        let outcome = RefreshOutcome {
            user_id: erin(),
            service: ServiceName::new("billing_api"),
            invalidated: true,
            refreshed: false,
            error: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["user_id"], "erin");
        assert!(json.get("error").is_none());
    }
}
