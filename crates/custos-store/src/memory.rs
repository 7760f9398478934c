//! In-memory attribute store.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use custos_core::{
    AttributeValue, RoleAssignment, SchemaError, ServiceManifest, ServiceName, User, UserId,
};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{BulkFailure, StoreError, StoreResult};
use crate::store::{AttributeStore, BoxFuture, RoleGrant};

#[derive(Debug, Default)]
struct Inner {
    services: HashMap<ServiceName, ServiceManifest>,
    /// `(service, role)` pairs declared global.
    global_roles: HashSet<(ServiceName, String)>,
    users: HashMap<UserId, User>,
    assignments: Vec<RoleAssignment>,
    attributes: HashMap<(UserId, ServiceName), BTreeMap<String, AttributeValue>>,
}

impl Inner {
    fn check_grant(&self, grant: &RoleGrant) -> StoreResult<()> {
        let manifest = self
            .services
            .get(&grant.service)
            .ok_or_else(|| StoreError::UnknownService(grant.service.to_string()))?;
        if manifest.role(&grant.role).is_none() {
            return Err(SchemaError::unknown_role(grant.service.as_str(), &grant.role).into());
        }
        if !self.users.contains_key(&grant.user_id) {
            return Err(StoreError::UnknownUser(grant.user_id.to_string()));
        }
        Ok(())
    }

    fn apply_grant(&mut self, grant: RoleGrant) -> RoleAssignment {
        let now = Utc::now();
        if let Some(existing) = self.assignments.iter_mut().find(|a| {
            a.user_id == grant.user_id
                && a.service == grant.service
                && a.role == grant.role
                && a.is_active_at(now)
        }) {
            existing.granted_by = grant.granted_by;
            existing.granted_at = now;
            existing.expires_at = grant.expires_at;
            return existing.clone();
        }

        let assignment = RoleAssignment::new(grant.user_id, grant.service, grant.role, grant.granted_by)
            .with_expiry(grant.expires_at);
        self.assignments.push(assignment.clone());
        assignment
    }

    fn applies_to(&self, assignment: &RoleAssignment, service: &ServiceName) -> bool {
        &assignment.service == service
            || self
                .global_roles
                .contains(&(assignment.service.clone(), assignment.role.clone()))
    }
}

/// An attribute store held entirely in process memory.
///
/// All operations take a single lock, so each one is atomic and a bulk
/// assignment is applied all at once or not at all.
#[derive(Debug, Default)]
pub struct MemoryAttributeStore {
    inner: RwLock<Inner>,
}

impl MemoryAttributeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assignments, active or not.
    pub fn assignment_count(&self) -> usize {
        self.inner.read().assignments.len()
    }

    fn register_service_sync(&self, manifest: &ServiceManifest) -> StoreResult<()> {
        manifest.validate()?;
        let mut inner = self.inner.write();
        inner.global_roles.retain(|(service, _)| service != &manifest.name);
        for role in manifest.roles.iter().filter(|role| role.global) {
            inner
                .global_roles
                .insert((manifest.name.clone(), role.name.clone()));
        }
        let replaced = inner
            .services
            .insert(manifest.name.clone(), manifest.clone())
            .is_some();
        info!(
            service = %manifest.name,
            roles = manifest.roles.len(),
            attributes = manifest.attributes.len(),
            replaced,
            "registered service manifest"
        );
        Ok(())
    }

    fn active_assignments_sync(&self, user_id: &UserId, service: &ServiceName) -> Vec<RoleAssignment> {
        let now = Utc::now();
        let inner = self.inner.read();
        inner
            .assignments
            .iter()
            .filter(|a| &a.user_id == user_id && a.is_active_at(now) && inner.applies_to(a, service))
            .cloned()
            .collect()
    }

    fn assign_role_sync(&self, grant: RoleGrant) -> StoreResult<RoleAssignment> {
        let mut inner = self.inner.write();
        inner.check_grant(&grant)?;
        let assignment = inner.apply_grant(grant);
        debug!(
            user_id = %assignment.user_id,
            service = %assignment.service,
            role = %assignment.role,
            "role assigned"
        );
        Ok(assignment)
    }

    fn bulk_assign_sync(&self, grants: Vec<RoleGrant>) -> StoreResult<Vec<RoleAssignment>> {
        let mut inner = self.inner.write();
        let failures: Vec<BulkFailure> = grants
            .iter()
            .enumerate()
            .filter_map(|(index, grant)| {
                inner.check_grant(grant).err().map(|e| BulkFailure {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect();

        if !failures.is_empty() {
            return Err(StoreError::BulkRejected {
                total: grants.len(),
                failures,
            });
        }

        Ok(grants.into_iter().map(|grant| inner.apply_grant(grant)).collect())
    }

    fn revoke_role_sync(&self, user_id: &UserId, role: &str, service: &ServiceName) -> usize {
        let mut inner = self.inner.write();
        let mut revoked = 0;
        for assignment in inner.assignments.iter_mut().filter(|a| {
            a.active && &a.user_id == user_id && a.role == role && &a.service == service
        }) {
            assignment.active = false;
            revoked += 1;
        }
        revoked
    }

    fn deactivate_assignment_sync(&self, id: Uuid) -> StoreResult<RoleAssignment> {
        let mut inner = self.inner.write();
        let assignment = inner
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::AssignmentNotFound(id.to_string()))?;
        assignment.active = false;
        Ok(assignment.clone())
    }

    fn set_attribute_sync(
        &self,
        user_id: &UserId,
        service: &ServiceName,
        name: &str,
        value: AttributeValue,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let manifest = inner
            .services
            .get(service)
            .ok_or_else(|| StoreError::UnknownService(service.to_string()))?;
        manifest.schema().validate(service.as_str(), name, &value)?;
        if !inner.users.contains_key(user_id) {
            return Err(StoreError::UnknownUser(user_id.to_string()));
        }
        inner
            .attributes
            .entry((user_id.clone(), service.clone()))
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    fn remove_attribute_sync(&self, user_id: &UserId, service: &ServiceName, name: &str) -> bool {
        let mut inner = self.inner.write();
        inner
            .attributes
            .get_mut(&(user_id.clone(), service.clone()))
            .and_then(|attributes| attributes.remove(name))
            .is_some()
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn register_service<'a>(&'a self, manifest: &'a ServiceManifest) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.register_service_sync(manifest) })
    }

    fn services(&self) -> BoxFuture<'_, StoreResult<Vec<ServiceName>>> {
        Box::pin(async move {
            let mut names: Vec<ServiceName> = self.inner.read().services.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    fn manifest<'a>(&'a self, service: &'a ServiceName) -> BoxFuture<'a, StoreResult<Option<ServiceManifest>>> {
        Box::pin(async move { Ok(self.inner.read().services.get(service).cloned()) })
    }

    fn upsert_user(&self, user: User) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.inner.write().users.insert(user.id.clone(), user);
            Ok(())
        })
    }

    fn get_user<'a>(&'a self, user_id: &'a UserId) -> BoxFuture<'a, StoreResult<Option<User>>> {
        Box::pin(async move { Ok(self.inner.read().users.get(user_id).cloned()) })
    }

    fn active_assignments<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<Vec<RoleAssignment>>> {
        Box::pin(async move { Ok(self.active_assignments_sync(user_id, service)) })
    }

    fn get_attributes<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<BTreeMap<String, AttributeValue>>> {
        Box::pin(async move {
            Ok(self
                .inner
                .read()
                .attributes
                .get(&(user_id.clone(), service.clone()))
                .cloned()
                .unwrap_or_default())
        })
    }

    fn assign_role(&self, grant: RoleGrant) -> BoxFuture<'_, StoreResult<RoleAssignment>> {
        Box::pin(async move { self.assign_role_sync(grant) })
    }

    fn bulk_assign(&self, grants: Vec<RoleGrant>) -> BoxFuture<'_, StoreResult<Vec<RoleAssignment>>> {
        Box::pin(async move { self.bulk_assign_sync(grants) })
    }

    fn revoke_role<'a>(
        &'a self,
        user_id: &'a UserId,
        role: &'a str,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<usize>> {
        Box::pin(async move { Ok(self.revoke_role_sync(user_id, role, service)) })
    }

    fn deactivate_assignment(&self, id: Uuid) -> BoxFuture<'_, StoreResult<RoleAssignment>> {
        Box::pin(async move { self.deactivate_assignment_sync(id) })
    }

    fn set_attribute<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
        name: &'a str,
        value: AttributeValue,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.set_attribute_sync(user_id, service, name, value) })
    }

    fn remove_attribute<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
        name: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { Ok(self.remove_attribute_sync(user_id, service, name)) })
    }
}
