//! The attribute store contract.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use custos_core::{
    AttributeValue, RoleAssignment, ServiceManifest, ServiceName, User, UserId,
};
use uuid::Uuid;

use crate::error::StoreResult;

pub use custos_core::BoxFuture;

/// A request to grant a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    /// The receiving user.
    pub user_id: UserId,
    /// The service declaring the role.
    pub service: ServiceName,
    /// Role name.
    pub role: String,
    /// Who grants it.
    pub granted_by: UserId,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleGrant {
    /// Creates a grant without expiry.
    pub fn new(
        user_id: impl Into<UserId>,
        service: impl Into<ServiceName>,
        role: impl Into<String>,
        granted_by: impl Into<UserId>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            service: service.into(),
            role: role.into(),
            granted_by: granted_by.into(),
            expires_at: None,
        }
    }

    /// Sets the expiry.
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Durable record of users, services, role assignments and attributes.
///
/// Reads for a service that has never been registered return no rows.
/// Writes are validated against the service manifest and rejected before
/// reaching storage when they do not match it.
pub trait AttributeStore: Send + Sync + 'static {
    /// Registers or replaces a service's manifest.
    fn register_service<'a>(&'a self, manifest: &'a ServiceManifest) -> BoxFuture<'a, StoreResult<()>>;

    /// Names of all registered services.
    fn services(&self) -> BoxFuture<'_, StoreResult<Vec<ServiceName>>>;

    /// The registered manifest of a service.
    fn manifest<'a>(&'a self, service: &'a ServiceName) -> BoxFuture<'a, StoreResult<Option<ServiceManifest>>>;

    /// Inserts or replaces a user.
    fn upsert_user(&self, user: User) -> BoxFuture<'_, StoreResult<()>>;

    /// Looks up a user.
    fn get_user<'a>(&'a self, user_id: &'a UserId) -> BoxFuture<'a, StoreResult<Option<User>>>;

    /// Assignments of `user_id` that are active now and apply to `service`,
    /// including global roles granted through any service.
    fn active_assignments<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<Vec<RoleAssignment>>>;

    /// Names of the roles `user_id` actively holds in `service`.
    fn get_active_role_names<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<BTreeSet<String>>> {
        Box::pin(async move {
            let assignments = self.active_assignments(user_id, service).await?;
            Ok(assignments.into_iter().map(|a| a.role).collect())
        })
    }

    /// Attribute values of `user_id` in `service`.
    fn get_attributes<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<BTreeMap<String, AttributeValue>>>;

    /// Grants a role. Re-granting an active role refreshes its grantor and expiry.
    fn assign_role(&self, grant: RoleGrant) -> BoxFuture<'_, StoreResult<RoleAssignment>>;

    /// Grants every role or none of them.
    fn bulk_assign(&self, grants: Vec<RoleGrant>) -> BoxFuture<'_, StoreResult<Vec<RoleAssignment>>>;

    /// Clears the active flag of the user's assignments of `role` in `service`.
    /// Returns the number of assignments deactivated.
    fn revoke_role<'a>(
        &'a self,
        user_id: &'a UserId,
        role: &'a str,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<usize>>;

    /// Clears the active flag of one assignment.
    fn deactivate_assignment(&self, id: Uuid) -> BoxFuture<'_, StoreResult<RoleAssignment>>;

    /// Sets an attribute after validating it against the service schema.
    fn set_attribute<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
        name: &'a str,
        value: AttributeValue,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Removes an attribute. Returns true if it existed.
    fn remove_attribute<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
        name: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>>;
}
