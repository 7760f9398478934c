//! Roles and policies guarding the admin endpoints.

use custos_authz::CustosBuilder;
use custos_core::{BindingDecl, Entity, PolicySpec, RoleDecl, ServiceManifest};
use tracing::{info, warn};

/// Entity type of admin targets.
pub const CACHE_ENTITY: &str = "attribute_cache";

/// Action of the refresh endpoints.
pub const REFRESH_ACTION: &str = "refresh_cache";

/// Action of the policy listing endpoint.
pub const LIST_POLICIES_ACTION: &str = "list_policies";

/// Role allowed to refresh caches.
pub const CACHE_ADMIN_ROLE: &str = "cache_admin";

/// Role allowed to read the policy registry.
pub const AUDITOR_ROLE: &str = "auditor";

/// Cross-service administrator role.
pub const PLATFORM_ADMIN_ROLE: &str = "platform_admin";

/// Policy gating the refresh endpoints.
pub const CACHE_ADMINS_POLICY: &str = "custos_admin.cache_admins";

/// Policy gating the policy listing endpoint.
pub const POLICY_READERS_POLICY: &str = "custos_admin.policy_readers";

/// The manifest registered for the server's own service identity.
#[must_use]
pub fn admin_manifest(service_name: &str) -> ServiceManifest {
    ServiceManifest::new(service_name)
        .with_role(RoleDecl::scoped(CACHE_ADMIN_ROLE))
        .with_role(RoleDecl::scoped(AUDITOR_ROLE))
        .with_role(RoleDecl::global(PLATFORM_ADMIN_ROLE))
        .with_policy(
            CACHE_ADMINS_POLICY,
            PolicySpec::RoleMembership {
                roles: vec![CACHE_ADMIN_ROLE.to_string(), PLATFORM_ADMIN_ROLE.to_string()],
            },
        )
        .with_policy(
            POLICY_READERS_POLICY,
            PolicySpec::RoleMembership {
                roles: vec![
                    CACHE_ADMIN_ROLE.to_string(),
                    AUDITOR_ROLE.to_string(),
                    PLATFORM_ADMIN_ROLE.to_string(),
                ],
            },
        )
        .with_binding(BindingDecl::new(CACHE_ENTITY, REFRESH_ACTION, CACHE_ADMINS_POLICY))
        .with_binding(BindingDecl::new(CACHE_ENTITY, LIST_POLICIES_ACTION, POLICY_READERS_POLICY))
}

/// Adds the service manifests and then the admin manifest to `builder`.
///
/// Same-named policies are replaced in registration order, so the admin
/// manifest goes last and its gates cannot be redefined by a service.
/// A service manifest claiming the admin service name is skipped.
pub fn register_manifests<I>(mut builder: CustosBuilder, service_name: &str, manifests: I) -> CustosBuilder
where
    I: IntoIterator<Item = ServiceManifest>,
{
    for manifest in manifests {
        if manifest.name.as_str() == service_name {
            warn!(service = %manifest.name, "skipping manifest that claims the admin service name");
            continue;
        }
        info!(service = %manifest.name, "loaded service manifest");
        builder = builder.manifest(manifest);
    }
    builder.manifest(admin_manifest(service_name))
}

/// The target every admin request is checked against.
pub fn cache_target() -> Entity {
    Entity::new(CACHE_ENTITY, "*")
}
