//! Fixtures for Custos development and testing.
//!
//! Pre-built service manifests modelled on the platform's own services.
//!
//! # Example
//!
//! ```
//! use custos_core::fixtures;
//!
//! let billing = fixtures::billing_manifest();
//! assert!(billing.role("billing_admin").is_some());
//! ```

use crate::attribute::{AttributeKind, AttributeValue};
use crate::manifest::{BindingDecl, PolicySpec, RoleDecl, ServiceManifest};

/// The billing service.
///
/// - roles `billing_admin`, `billing_viewer` and the global `platform_admin`
/// - attributes `budget_limit` (integer), `cost_center` (string)
/// - `invoice:view` and `invoice:list` need a billing role;
///   `invoice:approve` needs `billing_admin` and a matching cost center
#[must_use]
pub fn billing_manifest() -> ServiceManifest {
    ServiceManifest::new("billing_api")
        .with_role(RoleDecl::scoped("billing_admin"))
        .with_role(RoleDecl::scoped("billing_viewer"))
        .with_role(RoleDecl::global("platform_admin"))
        .with_attribute("budget_limit", AttributeKind::Integer)
        .with_attribute("cost_center", AttributeKind::String)
        .with_policy(
            "billing_staff",
            PolicySpec::RoleMembership {
                roles: vec!["billing_admin".to_string(), "billing_viewer".to_string()],
            },
        )
        .with_policy(
            "billing_admins",
            PolicySpec::RoleMembership {
                roles: vec!["billing_admin".to_string()],
            },
        )
        .with_policy(
            "same_cost_center",
            PolicySpec::AttributeMatchesTarget {
                attribute: "cost_center".to_string(),
                target_attribute: "cost_center".to_string(),
            },
        )
        .with_policy(
            "invoice_approver",
            PolicySpec::AllOf {
                policies: vec!["billing_admins".to_string(), "same_cost_center".to_string()],
            },
        )
        .with_binding(BindingDecl::new("invoice", "view", "billing_staff"))
        .with_binding(BindingDecl::new("invoice", "list", "billing_staff"))
        .with_binding(BindingDecl::new("invoice", "approve", "invoice_approver"))
}

/// The inventory service.
///
/// Items are visible to their owner or when marked public.
#[must_use]
pub fn inventory_manifest() -> ServiceManifest {
    ServiceManifest::new("inventory_api")
        .with_role(RoleDecl::scoped("stock_keeper"))
        .with_attribute("warehouse", AttributeKind::String)
        .with_policy("item_owner", PolicySpec::Ownership)
        .with_policy(
            "public_item",
            PolicySpec::TargetAttributeEquals {
                target_attribute: "public".to_string(),
                value: AttributeValue::Boolean(true),
            },
        )
        .with_policy(
            "stock_keepers",
            PolicySpec::RoleMembership {
                roles: vec!["stock_keeper".to_string()],
            },
        )
        .with_policy(
            "ownership_or_public",
            PolicySpec::AnyOf {
                policies: vec!["item_owner".to_string(), "public_item".to_string()],
            },
        )
        .with_binding(BindingDecl::new("item", "view", "ownership_or_public"))
        .with_binding(BindingDecl::new("item", "edit", "item_owner"))
        .with_binding(BindingDecl::untyped("restock", "stock_keepers"))
}

/// The identity provider.
///
/// - roles `user_admin`, `support`
/// - attributes `mfa_enrolled` (boolean), `groups` (list)
#[must_use]
pub fn identity_manifest() -> ServiceManifest {
    ServiceManifest::new("identity_provider")
        .with_role(RoleDecl::scoped("user_admin"))
        .with_role(RoleDecl::scoped("support"))
        .with_attribute("mfa_enrolled", AttributeKind::Boolean)
        .with_attribute("groups", AttributeKind::List)
        .with_policy(
            "user_admins",
            PolicySpec::RoleMembership {
                roles: vec!["user_admin".to_string()],
            },
        )
        .with_policy(
            "mfa_required",
            PolicySpec::AttributeEquals {
                attribute: "mfa_enrolled".to_string(),
                value: AttributeValue::Boolean(true),
            },
        )
        .with_policy("signed_in", PolicySpec::AuthenticatedOnly)
        .with_binding(BindingDecl::new("user", "edit", "user_admins"))
        .with_binding(BindingDecl::new("user", "view", "signed_in"))
        .with_binding(BindingDecl::untyped("rotate_keys", "mfa_required"))
}
