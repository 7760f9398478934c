//! Wiring of store, cache, registry and engine.

use std::sync::Arc;

use custos_cache::{AttributeCache, CacheConfig, MemoryAttributeCache};
use custos_core::{BindingDecl, Decision, Resource, ServiceManifest, ServiceName, UserId};
use custos_policy::{build_policy, Policy, PolicyBindings, PolicyRegistry};
use custos_store::{AttributeStore, MemoryAttributeStore};
use tracing::{info, warn};

use crate::admin::AccessAdmin;
use crate::config::EngineConfig;
use crate::engine::PolicyEngine;
use crate::error::{AuthzError, AuthzResult};
use crate::notifier::InvalidationNotifier;
use crate::refresh::{store_call, RefreshPipeline};

/// Builder for [`Custos`].
///
/// Policies and bindings are collected in call order: a manifest's
/// policies replace same-named policies registered before it, and vice
/// versa. Manifests are registered with the store in [`build`](Self::build).
#[derive(Default)]
pub struct CustosBuilder {
    store: Option<Arc<dyn AttributeStore>>,
    cache: Option<Arc<dyn AttributeCache>>,
    config: EngineConfig,
    cache_config: CacheConfig,
    registry: PolicyRegistry,
    bindings: PolicyBindings,
    manifests: Vec<ServiceManifest>,
}

impl CustosBuilder {
    /// Uses `store` instead of an in-memory store.
    pub fn store(mut self, store: Arc<dyn AttributeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses `cache` instead of an in-memory cache.
    pub fn cache(mut self, cache: Arc<dyn AttributeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Configures the default in-memory cache.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Registers a policy defined in code.
    pub fn policy<P>(mut self, policy: P) -> Self
    where
        P: Policy + 'static,
    {
        self.registry.register(policy);
        self
    }

    /// Binds `(entity_type, action)` in `service` to `policy`.
    pub fn bind(
        mut self,
        service: impl Into<ServiceName>,
        entity_type: Option<&str>,
        action: &str,
        policy: impl Into<String>,
    ) -> Self {
        self.bindings.bind(&service.into(), entity_type, action, policy);
        self
    }

    /// Adds a service manifest: its policies, bindings, roles and schema.
    pub fn manifest(mut self, manifest: ServiceManifest) -> Self {
        for decl in &manifest.policies {
            self.registry.register_arc(build_policy(decl));
        }
        self.bindings.replace_service(&manifest.name, &manifest.bindings);
        self.manifests.push(manifest);
        self
    }

    /// Registers the manifests with the store and assembles the engine.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an invalid manifest and
    /// `BackingStoreUnavailable` if the store cannot be reached.
    pub async fn build(self) -> AuthzResult<Custos> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryAttributeStore::new()));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryAttributeCache::new(self.cache_config.clone())));

        for manifest in &self.manifests {
            manifest.validate().map_err(|e| AuthzError::configuration(e.to_string()))?;
            store_call(self.config.store_timeout, store.register_service(manifest)).await?;
            report_dangling(&self.registry, &manifest.name, &manifest.bindings);
        }

        let registry = Arc::new(self.registry);
        let bindings = Arc::new(self.bindings);
        let pipeline = Arc::new(RefreshPipeline::new(store.clone(), cache.clone(), self.config.clone()));
        let notifier = InvalidationNotifier::new(pipeline.clone());
        let admin = AccessAdmin::new(store.clone(), notifier.clone(), self.config.store_timeout);
        let engine = Arc::new(PolicyEngine::new(registry.clone(), bindings, pipeline));

        info!(
            services = self.manifests.len(),
            policies = registry.len(),
            cache_ttl_secs = self.config.cache_ttl.as_secs(),
            auto_refresh = self.config.auto_refresh,
            "authorization engine ready"
        );

        Ok(Custos {
            engine,
            notifier,
            admin,
            store,
            cache,
        })
    }
}

fn report_dangling(registry: &PolicyRegistry, service: &ServiceName, bindings: &[BindingDecl]) {
    for binding in bindings.iter().filter(|b| !registry.contains(&b.policy)) {
        warn!(
            service = %service,
            action = %binding.action,
            entity_type = ?binding.entity_type,
            policy = %binding.policy,
            defect = "configuration",
            "binding references an unregistered policy; requests will be denied"
        );
    }
}

/// The assembled authorization core.
///
/// Cheap to clone; clones share every component.
#[derive(Clone)]
pub struct Custos {
    engine: Arc<PolicyEngine>,
    notifier: InvalidationNotifier,
    admin: AccessAdmin,
    store: Arc<dyn AttributeStore>,
    cache: Arc<dyn AttributeCache>,
}

impl std::fmt::Debug for Custos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Custos")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Custos {
    /// Starts a builder.
    pub fn builder() -> CustosBuilder {
        CustosBuilder::default()
    }

    /// The policy engine.
    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// The invalidation notifier.
    pub fn notifier(&self) -> &InvalidationNotifier {
        &self.notifier
    }

    /// Administrative mutations.
    pub fn admin(&self) -> &AccessAdmin {
        &self.admin
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn AttributeStore> {
        &self.store
    }

    /// The attribute cache.
    pub fn cache(&self) -> &Arc<dyn AttributeCache> {
        &self.cache
    }

    /// The policy registry.
    pub fn registry(&self) -> &PolicyRegistry {
        self.engine.registry()
    }

    /// Shorthand for [`PolicyEngine::authorize`].
    pub async fn authorize(
        &self,
        user_id: &UserId,
        service: &ServiceName,
        action: &str,
        target: Option<&dyn Resource>,
    ) -> Decision {
        self.engine.authorize(user_id, service, action, target).await
    }
}
