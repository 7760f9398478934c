//! Behavior when the store or the cache misbehaves.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{custos_with, inventory, user, CountingCache, FailingCache, FlakyStore};
use custos_authz::{AuthzError, EngineConfig};
use custos_cache::AttributeCache;
use custos_core::{DecisionCode, Entity};
use custos_store::{AttributeStore, RoleGrant};

#[tokio::test]
async fn test_store_outage_denies_as_unavailable() {
    let store = Arc::new(FlakyStore::default());
    let custos = custos_with(store.clone(), Arc::new(CountingCache::default()), EngineConfig::default()).await;
    store.set_down(true);

    let own = Entity::new("item", "sku-1").with_owner("dave");
    let decision = custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await;
    assert!(!decision.allow);
    assert_eq!(decision.code, DecisionCode::BackingStoreUnavailable);
    assert!(decision.is_unavailable());
}

#[tokio::test]
async fn test_cached_bundle_survives_store_outage() {
    let store = Arc::new(FlakyStore::default());
    let custos = custos_with(store.clone(), Arc::new(CountingCache::default()), EngineConfig::default()).await;
    let own = Entity::new("item", "sku-1").with_owner("dave");
    assert!(custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await.allow);

    store.set_down(true);
    assert!(custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await.allow);
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out_closed() {
    let store = Arc::new(FlakyStore::default());
    let custos = custos_with(
        store.clone(),
        Arc::new(CountingCache::default()),
        EngineConfig::default().with_store_timeout(Duration::from_millis(100)),
    )
    .await;
    store.set_delay(Duration::from_secs(30));

    let own = Entity::new("item", "sku-1").with_owner("dave");
    let decision = custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await;
    assert!(!decision.allow);
    assert_eq!(decision.code, DecisionCode::BackingStoreUnavailable);
    assert!(decision.reason.contains("timed out"), "reason: {}", decision.reason);
}

#[tokio::test]
async fn test_filter_hides_everything_during_store_outage() {
    let store = Arc::new(FlakyStore::default());
    let custos = custos_with(store.clone(), Arc::new(CountingCache::default()), EngineConfig::default()).await;
    store.set_down(true);

    let items = vec![
        Entity::new("item", "sku-1").with_owner("dave"),
        Entity::new("item", "sku-2").with_attribute("public", true),
    ];
    let visible = custos.engine().filter(&user("dave"), &inventory(), "view", items).await;
    assert!(visible.is_empty());
}

#[tokio::test]
async fn test_invalidation_failure_is_reported_after_write() {
    let cache = Arc::new(FailingCache::default());
    let custos = custos_with(Arc::new(FlakyStore::default()), cache.clone(), EngineConfig::default()).await;

    let err = custos
        .admin()
        .assign_role(RoleGrant::new("dave", "inventory_api", "stock_keeper", "root"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::CacheUnavailable(_)));
    assert!(err.is_retryable());
    assert!(!err.is_unavailable());
    assert_eq!(cache.calls(), 3);

    let roles = custos
        .store()
        .get_active_role_names(&user("dave"), &inventory())
        .await
        .unwrap();
    assert!(roles.contains("stock_keeper"));
}

#[tokio::test]
async fn test_auto_refresh_off_leaves_cache_untouched() {
    let cache = Arc::new(CountingCache::default());
    let custos = custos_with(
        Arc::new(FlakyStore::default()),
        cache.clone(),
        EngineConfig::default().with_auto_refresh(false),
    )
    .await;

    let own = Entity::new("item", "sku-1").with_owner("dave");
    assert!(custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await.allow);
    assert_eq!(cache.puts(), 0);
    assert!(cache.get(&user("dave"), &inventory()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_eager_refresh_reports_store_failure() {
    let store = Arc::new(FlakyStore::default());
    let custos = custos_with(store.clone(), Arc::new(CountingCache::default()), EngineConfig::default()).await;
    store.set_down(true);

    let outcomes = custos
        .notifier()
        .force_refresh(&[(user("dave"), inventory())], true)
        .await;
    assert!(outcomes[0].invalidated);
    assert!(!outcomes[0].refreshed);
    assert!(!outcomes[0].is_ok());
}
