//! Administrative mutations that keep the cache coherent.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use custos_core::{AttributeValue, RoleAssignment, ServiceName, User, UserId};
use custos_store::{AttributeStore, RoleGrant};
use tracing::info;
use uuid::Uuid;

use crate::error::AuthzResult;
use crate::notifier::InvalidationNotifier;
use crate::refresh::store_call;

/// Which cached bundles a role change affects.
enum Scope {
    Pair(UserId, ServiceName),
    User(UserId),
}

/// Writes roles and attributes, then invalidates the affected bundles.
///
/// Every method invalidates in the same call as the write. A change to a
/// global role invalidates all of the user's bundles.
#[derive(Clone)]
pub struct AccessAdmin {
    store: Arc<dyn AttributeStore>,
    notifier: InvalidationNotifier,
    timeout: Duration,
}

impl std::fmt::Debug for AccessAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessAdmin")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AccessAdmin {
    /// Creates an admin over `store`.
    pub fn new(store: Arc<dyn AttributeStore>, notifier: InvalidationNotifier, timeout: Duration) -> Self {
        Self {
            store,
            notifier,
            timeout,
        }
    }

    /// The notifier used after each write.
    pub fn notifier(&self) -> &InvalidationNotifier {
        &self.notifier
    }

    /// Inserts or replaces a user. Invalidates all of the user's bundles,
    /// since the active flag feeds every one of them.
    pub async fn upsert_user(&self, user: User) -> AuthzResult<()> {
        let user_id = user.id.clone();
        store_call(self.timeout, self.store.upsert_user(user)).await?;
        self.notifier.notify_user(&user_id).await?;
        Ok(())
    }

    /// Grants a role.
    pub async fn assign_role(&self, grant: RoleGrant) -> AuthzResult<RoleAssignment> {
        let assignment = store_call(self.timeout, self.store.assign_role(grant)).await?;
        self.invalidate_for(&assignment.user_id, &assignment.service, &assignment.role)
            .await?;
        info!(
            user_id = %assignment.user_id,
            service = %assignment.service,
            role = %assignment.role,
            granted_by = %assignment.granted_by,
            expires_at = ?assignment.expires_at,
            "role assigned"
        );
        Ok(assignment)
    }

    /// Grants every role or none.
    pub async fn bulk_assign(&self, grants: Vec<RoleGrant>) -> AuthzResult<Vec<RoleAssignment>> {
        let assignments = store_call(self.timeout, self.store.bulk_assign(grants)).await?;

        let mut seen = BTreeSet::new();
        for assignment in &assignments {
            let key = (assignment.user_id.clone(), assignment.service.clone(), assignment.role.clone());
            if seen.insert(key) {
                self.invalidate_for(&assignment.user_id, &assignment.service, &assignment.role)
                    .await?;
            }
        }
        info!(count = assignments.len(), "bulk role assignment applied");
        Ok(assignments)
    }

    /// Revokes a role. Returns the number of assignments deactivated.
    pub async fn revoke_role(&self, user_id: &UserId, role: &str, service: &ServiceName) -> AuthzResult<usize> {
        let revoked = store_call(self.timeout, self.store.revoke_role(user_id, role, service)).await?;
        self.invalidate_for(user_id, service, role).await?;
        info!(user_id = %user_id, service = %service, role, revoked, "role revoked");
        Ok(revoked)
    }

    /// Deactivates one assignment.
    pub async fn deactivate_assignment(&self, id: Uuid) -> AuthzResult<RoleAssignment> {
        let assignment = store_call(self.timeout, self.store.deactivate_assignment(id)).await?;
        self.invalidate_for(&assignment.user_id, &assignment.service, &assignment.role)
            .await?;
        info!(assignment = %id, user_id = %assignment.user_id, "role assignment deactivated");
        Ok(assignment)
    }

    /// Sets an attribute. A value that does not match the schema is
    /// rejected before anything is written or invalidated.
    pub async fn set_attribute(
        &self,
        user_id: &UserId,
        service: &ServiceName,
        name: &str,
        value: AttributeValue,
    ) -> AuthzResult<()> {
        store_call(self.timeout, self.store.set_attribute(user_id, service, name, value)).await?;
        self.notifier.notify(user_id, service).await?;
        Ok(())
    }

    /// Removes an attribute. Returns true if it existed.
    pub async fn remove_attribute(&self, user_id: &UserId, service: &ServiceName, name: &str) -> AuthzResult<bool> {
        let removed = store_call(self.timeout, self.store.remove_attribute(user_id, service, name)).await?;
        if removed {
            self.notifier.notify(user_id, service).await?;
        }
        Ok(removed)
    }

    async fn invalidate_for(&self, user_id: &UserId, service: &ServiceName, role: &str) -> AuthzResult<()> {
        match self.scope_of(user_id, service, role).await? {
            Scope::Pair(user_id, service) => self.notifier.notify(&user_id, &service).await?,
            Scope::User(user_id) => self.notifier.notify_user(&user_id).await?,
        };
        Ok(())
    }

    async fn scope_of(&self, user_id: &UserId, service: &ServiceName, role: &str) -> AuthzResult<Scope> {
        let manifest = store_call(self.timeout, self.store.manifest(service)).await?;
        let global = manifest
            .as_ref()
            .and_then(|m| m.role(role))
            .is_some_and(|decl| decl.global);
        Ok(if global {
            Scope::User(user_id.clone())
        } else {
            Scope::Pair(user_id.clone(), service.clone())
        })
    }
}
