//! Building policies from manifest declarations.

use std::sync::Arc;

use custos_core::{PolicyDecl, PolicySpec};

use crate::builtin::{
    AllOf, AlwaysAllow, AlwaysDeny, AnyOf, AttributeEquals, AttributeMatchesTarget,
    AuthenticatedOnly, OwnershipCheck, RoleMembership, TargetAttributeEquals,
};
use crate::policy::Policy;

/// Instantiates the built-in policy a manifest declares.
pub fn build_policy(decl: &PolicyDecl) -> Arc<dyn Policy> {
    let name = decl.name.clone();
    match &decl.spec {
        PolicySpec::AlwaysAllow => Arc::new(AlwaysAllow::new(name)),
        PolicySpec::AlwaysDeny => Arc::new(AlwaysDeny::new(name)),
        PolicySpec::AuthenticatedOnly => Arc::new(AuthenticatedOnly::new(name)),
        PolicySpec::Ownership => Arc::new(OwnershipCheck::new(name)),
        PolicySpec::RoleMembership { roles } => Arc::new(RoleMembership::new(name, roles.iter().cloned())),
        PolicySpec::AttributeEquals { attribute, value } => {
            Arc::new(AttributeEquals::new(name, attribute.clone(), value.clone()))
        }
        PolicySpec::TargetAttributeEquals {
            target_attribute,
            value,
        } => Arc::new(TargetAttributeEquals::new(name, target_attribute.clone(), value.clone())),
        PolicySpec::AttributeMatchesTarget {
            attribute,
            target_attribute,
        } => Arc::new(AttributeMatchesTarget::new(name, attribute.clone(), target_attribute.clone())),
        PolicySpec::AnyOf { policies } => Arc::new(AnyOf::new(name, policies.iter().cloned())),
        PolicySpec::AllOf { policies } => Arc::new(AllOf::new(name, policies.iter().cloned())),
    }
}
