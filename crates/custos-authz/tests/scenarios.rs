//! End-to-end authorization scenarios over the fixture services.

mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use common::{billing, counting_custos, custos_with, identity, inventory, user, FailingCache, FlakyStore, HangingCache};
use custos_authz::{AuthzError, EngineConfig};
use custos_cache::AttributeCache;
use custos_core::{AttributeKind, AttributeValue, DecisionCode, Entity};
use custos_store::{AttributeStore, RoleGrant};

#[tokio::test]
async fn test_active_admin_role_grants_view() {
    let (custos, _) = counting_custos().await;
    custos
        .admin()
        .assign_role(RoleGrant::new("alice", "billing_api", "billing_admin", "root"))
        .await
        .unwrap();

    let invoice = Entity::new("invoice", "inv-1001");
    let decision = custos
        .authorize(&user("alice"), &billing(), "view", Some(&invoice))
        .await;
    assert!(decision.allow);
    assert_eq!(decision.code, DecisionCode::Granted);
    assert_eq!(decision.policy.as_deref(), Some("billing_staff"));
}

#[tokio::test]
async fn test_expired_role_denies_with_reason() {
    let (custos, _) = counting_custos().await;
    custos
        .admin()
        .assign_role(
            RoleGrant::new("bob", "billing_api", "billing_viewer", "root")
                .expires_at(Utc::now() - ChronoDuration::days(1)),
        )
        .await
        .unwrap();

    let invoice = Entity::new("invoice", "inv-1001");
    let decision = custos
        .authorize(&user("bob"), &billing(), "view", Some(&invoice))
        .await;
    assert!(!decision.allow);
    assert_eq!(decision.code, DecisionCode::Denied);
    assert!(decision.reason.contains("no matching active role"), "reason: {}", decision.reason);
}

#[tokio::test]
async fn test_attribute_type_mismatch_writes_nothing() {
    let (custos, cache) = counting_custos().await;
    cache.reset();

    let err = custos
        .admin()
        .set_attribute(&user("carol"), &billing(), "budget_limit", AttributeValue::from("not-a-number"))
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
    match err {
        AuthzError::AttributeTypeMismatch {
            attribute,
            expected,
            actual,
        } => {
            assert_eq!(attribute, "budget_limit");
            assert_eq!(expected, AttributeKind::Integer);
            assert_eq!(actual, AttributeKind::String);
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }

    let stored = custos.store().get_attributes(&user("carol"), &billing()).await.unwrap();
    assert!(stored.is_empty());
    assert_eq!(cache.puts(), 0);
    assert_eq!(cache.invalidations(), 0);
}

#[tokio::test]
async fn test_cache_outage_falls_through_to_store() {
    let cache = Arc::new(FailingCache::default());
    let custos = custos_with(Arc::new(FlakyStore::default()), cache.clone(), EngineConfig::default()).await;
    custos
        .store()
        .set_attribute(&user("dave"), &inventory(), "warehouse", "north".into())
        .await
        .unwrap();

    let own = Entity::new("item", "sku-1").with_owner("dave");
    let foreign = Entity::new("item", "sku-2").with_owner("erin");
    let public = Entity::new("item", "sku-3").with_owner("erin").with_attribute("public", true);

    let decision = custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await;
    assert!(decision.allow);
    assert_eq!(decision.code, DecisionCode::Granted);

    let decision = custos.authorize(&user("dave"), &inventory(), "view", Some(&foreign)).await;
    assert!(!decision.allow);
    assert_eq!(decision.code, DecisionCode::Denied);

    assert!(custos.authorize(&user("dave"), &inventory(), "view", Some(&public)).await.allow);
    assert!(cache.calls() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_cache_degrades_to_refresh() {
    let custos = custos_with(
        Arc::new(FlakyStore::default()),
        Arc::new(HangingCache),
        EngineConfig::default().with_cache_timeout(std::time::Duration::from_millis(50)),
    )
    .await;

    let own = Entity::new("item", "sku-1").with_owner("dave");
    let decision = custos.authorize(&user("dave"), &inventory(), "view", Some(&own)).await;
    assert!(decision.allow);
}

#[tokio::test]
async fn test_manual_refresh_picks_up_recent_grant() {
    let (custos, cache) = counting_custos().await;
    let erin = user("erin");
    let account = Entity::new("user", "frank");

    let before = custos.authorize(&erin, &identity(), "edit", Some(&account)).await;
    assert!(!before.allow);
    assert!(cache.get(&erin, &identity()).await.unwrap().is_some());

    // Granted by another process a second ago; this cache was not told.
    custos
        .store()
        .assign_role(RoleGrant::new("erin", "identity_provider", "user_admin", "root"))
        .await
        .unwrap();
    assert!(!custos.authorize(&erin, &identity(), "edit", Some(&account)).await.allow);

    let outcomes = custos
        .notifier()
        .force_refresh(&[(erin.clone(), identity())], true)
        .await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[0].invalidated);
    assert!(outcomes[0].refreshed);

    let cached = cache.get(&erin, &identity()).await.unwrap().unwrap();
    assert!(cached.has_role("user_admin"));
    let after = custos.authorize(&erin, &identity(), "edit", Some(&account)).await;
    assert!(after.allow);
}

#[tokio::test]
async fn test_refresh_for_user_covers_every_service() {
    let (custos, cache) = counting_custos().await;
    let erin = user("erin");
    for service in [billing(), inventory(), identity()] {
        custos.engine().bundle(&erin, &service).await.unwrap();
    }

    let refresh = custos.notifier().force_refresh_user(&erin, false).await.unwrap();
    assert_eq!(refresh.invalidated, 3);
    assert!(refresh.outcomes.is_empty());
    for service in [billing(), inventory(), identity()] {
        assert!(cache.get(&erin, &service).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_global_role_applies_across_services() {
    let (custos, _) = counting_custos().await;
    let frank = user("frank");
    custos
        .admin()
        .assign_role(RoleGrant::new("frank", "billing_api", "platform_admin", "root"))
        .await
        .unwrap();

    let bundle = custos.engine().bundle(&frank, &identity()).await.unwrap();
    assert!(bundle.has_role("platform_admin"));
}

#[tokio::test]
async fn test_approve_needs_role_and_matching_cost_center() {
    let (custos, _) = counting_custos().await;
    let alice = user("alice");
    let admin = custos.admin();
    admin
        .assign_role(RoleGrant::new("alice", "billing_api", "billing_admin", "root"))
        .await
        .unwrap();
    admin
        .set_attribute(&alice, &billing(), "cost_center", "cc-7".into())
        .await
        .unwrap();

    let same = Entity::new("invoice", "inv-1").with_attribute("cost_center", "cc-7");
    let other = Entity::new("invoice", "inv-2").with_attribute("cost_center", "cc-9");
    assert!(custos.authorize(&alice, &billing(), "approve", Some(&same)).await.allow);
    let denied = custos.authorize(&alice, &billing(), "approve", Some(&other)).await;
    assert!(!denied.allow);
    assert_eq!(denied.policy.as_deref(), Some("invoice_approver"));
}

#[tokio::test]
async fn test_bulk_assign_is_all_or_nothing() {
    let (custos, _) = counting_custos().await;
    let err = custos
        .admin()
        .bulk_assign(vec![
            RoleGrant::new("alice", "billing_api", "billing_viewer", "root"),
            RoleGrant::new("alice", "billing_api", "janitor", "root"),
        ])
        .await
        .unwrap_err();
    match err {
        AuthzError::BulkRejected { total, failures } => {
            assert_eq!(total, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
        }
        other => panic!("expected a bulk rejection, got {other:?}"),
    }
    let roles = custos
        .store()
        .get_active_role_names(&user("alice"), &billing())
        .await
        .unwrap();
    assert!(roles.is_empty());
}
