//! The policy engine: authorization decisions.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use custos_core::{AttributeBundle, Decision, DecisionCode, Resource, ServiceName, UserId};
use custos_policy::{Policy, PolicyBindings, PolicyContext, PolicyRegistry};
use custos_telemetry::record_decision;
use tracing::{debug, error, info, instrument, warn};

use crate::error::AuthzResult;
use crate::refresh::RefreshPipeline;

/// A binding and policy resolved for one request.
enum Resolution {
    Policy(String, Arc<dyn Policy>),
    Denied(Decision),
}

/// Evaluates authorization requests.
///
/// Every failure resolves to a deny:
///
/// | Failure | Decision code |
/// |---------|---------------|
/// | no binding for `(entity type, action)` | `NoBinding` |
/// | bound policy not registered | `PolicyNotFound` |
/// | store unreachable or timed out | `BackingStoreUnavailable` |
/// | policy returned an error or panicked | `PolicyError` |
///
/// Cache failures do not appear here: they degrade to a refresh.
pub struct PolicyEngine {
    registry: Arc<PolicyRegistry>,
    bindings: Arc<PolicyBindings>,
    pipeline: Arc<RefreshPipeline>,
    auto_refresh: bool,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("policies", &self.registry.len())
            .field("bindings", &self.bindings.len())
            .field("auto_refresh", &self.auto_refresh)
            .finish_non_exhaustive()
    }
}

impl PolicyEngine {
    /// Creates an engine. Refresh on miss follows the pipeline configuration.
    pub fn new(registry: Arc<PolicyRegistry>, bindings: Arc<PolicyBindings>, pipeline: Arc<RefreshPipeline>) -> Self {
        let auto_refresh = pipeline.config().auto_refresh;
        Self {
            registry,
            bindings,
            pipeline,
            auto_refresh,
        }
    }

    /// Overrides refresh on cache miss.
    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    /// The policy registry.
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// The binding table.
    pub fn bindings(&self) -> &PolicyBindings {
        &self.bindings
    }

    /// The refresh pipeline.
    pub fn pipeline(&self) -> &RefreshPipeline {
        &self.pipeline
    }

    /// Fetches the bundle a decision for `(user_id, service)` would use.
    pub async fn bundle(&self, user_id: &UserId, service: &ServiceName) -> AuthzResult<AttributeBundle> {
        self.pipeline.get(user_id, service, self.auto_refresh).await
    }

    /// Decides whether `user_id` may perform `action` in `service`.
    ///
    /// The binding is selected by the target's entity type, or by the
    /// action alone when there is no target. Binding and policy are
    /// resolved before the bundle is fetched, so misconfiguration never
    /// reaches the store.
    #[instrument(skip_all, fields(user_id = %user_id, service = %service, action = %action))]
    pub async fn authorize(
        &self,
        user_id: &UserId,
        service: &ServiceName,
        action: &str,
        target: Option<&dyn Resource>,
    ) -> Decision {
        let entity_type = target.map(|t| t.entity_type());
        let (policy_name, policy) = match self.resolve(service, entity_type, action) {
            Resolution::Policy(name, policy) => (name, policy),
            Resolution::Denied(decision) => return self.finish(user_id, service, action, decision),
        };

        let decision = match self.bundle(user_id, service).await {
            Ok(bundle) => self.evaluate(&policy_name, policy.as_ref(), &bundle, target, action),
            Err(e) => Decision::store_unavailable(policy_name, e),
        };
        self.finish(user_id, service, action, decision)
    }

    /// Decides against an already fetched bundle.
    pub fn authorize_with_bundle(
        &self,
        bundle: &AttributeBundle,
        action: &str,
        target: Option<&dyn Resource>,
    ) -> Decision {
        let decision = self.decide(bundle, action, target);
        self.finish(&bundle.user_id, &bundle.service, action, decision)
    }

    /// Keeps the candidates `user_id` may perform `action` on.
    ///
    /// The bundle is fetched once, before any candidate is evaluated. If it
    /// cannot be fetched, nothing is visible.
    #[instrument(skip_all, fields(user_id = %user_id, service = %service, action = %action))]
    pub async fn filter<I, R>(&self, user_id: &UserId, service: &ServiceName, action: &str, candidates: I) -> Vec<R>
    where
        I: IntoIterator<Item = R>,
        R: Resource,
    {
        let bundle = match self.bundle(user_id, service).await {
            Ok(bundle) => bundle,
            Err(e) => {
                let decision = Decision::store_unavailable("<filter>", e);
                self.finish(user_id, service, action, decision);
                return Vec::new();
            }
        };

        let visible: Vec<R> = candidates
            .into_iter()
            .filter(|candidate| self.decide(&bundle, action, Some(candidate as &dyn Resource)).allow)
            .collect();
        debug!(visible = visible.len(), "filtered candidates");
        visible
    }

    fn resolve(&self, service: &ServiceName, entity_type: Option<&str>, action: &str) -> Resolution {
        let Some(policy_name) = self.bindings.resolve(service, entity_type, action) else {
            return Resolution::Denied(Decision::no_binding(entity_type, action));
        };
        match self.registry.lookup(policy_name) {
            Some(policy) => Resolution::Policy(policy_name.to_string(), policy),
            None => Resolution::Denied(Decision::policy_not_found(policy_name)),
        }
    }

    fn decide(&self, bundle: &AttributeBundle, action: &str, target: Option<&dyn Resource>) -> Decision {
        let entity_type = target.map(|t| t.entity_type());
        match self.resolve(&bundle.service, entity_type, action) {
            Resolution::Policy(name, policy) => self.evaluate(&name, policy.as_ref(), bundle, target, action),
            Resolution::Denied(decision) => decision,
        }
    }

    fn evaluate(
        &self,
        policy_name: &str,
        policy: &dyn Policy,
        bundle: &AttributeBundle,
        target: Option<&dyn Resource>,
        action: &str,
    ) -> Decision {
        let ctx = PolicyContext::new(bundle, target, action).with_registry(&self.registry);
        match panic::catch_unwind(AssertUnwindSafe(|| policy.evaluate(&ctx))) {
            Ok(Ok(verdict)) if verdict.allowed => Decision::grant(policy_name, verdict.reason),
            Ok(Ok(verdict)) => Decision::deny(policy_name, verdict.reason),
            Ok(Err(e)) => Decision::policy_error(policy_name, e),
            Err(payload) => Decision::policy_error(policy_name, format!("panicked: {}", panic_message(&*payload))),
        }
    }

    fn finish(&self, user_id: &UserId, service: &ServiceName, action: &str, decision: Decision) -> Decision {
        record_decision(service.as_str(), decision.code);
        let policy = decision.policy.as_deref().unwrap_or("-");
        match decision.code {
            DecisionCode::Granted => debug!(
                user_id = %user_id, service = %service, action, policy, code = %decision.code,
                reason = %decision.reason, "access granted"
            ),
            DecisionCode::Denied => info!(
                user_id = %user_id, service = %service, action, policy, code = %decision.code,
                reason = %decision.reason, "access denied"
            ),
            DecisionCode::NoBinding | DecisionCode::PolicyNotFound => warn!(
                user_id = %user_id, service = %service, action, policy, code = %decision.code,
                defect = "configuration", reason = %decision.reason, "access denied by configuration"
            ),
            DecisionCode::BackingStoreUnavailable | DecisionCode::PolicyError => error!(
                user_id = %user_id, service = %service, action, policy, code = %decision.code,
                reason = %decision.reason, "access denied by failure"
            ),
        }
        decision
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
