//! Users and role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{ServiceName, UserId};

/// A user as known to the attribute store.
///
/// The authorization core reads users but never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Whether the account is active (may authenticate).
    pub is_active: bool,
}

impl User {
    /// Creates an active user.
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_active: true,
        }
    }

    /// Marks the user inactive.
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A grant of one role to one user within one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Assignment identifier.
    pub id: Uuid,
    /// The user holding the role.
    pub user_id: UserId,
    /// The service that declares the role.
    pub service: ServiceName,
    /// Role name.
    pub role: String,
    /// Who granted the role.
    pub granted_by: UserId,
    /// When the role was granted.
    pub granted_at: DateTime<Utc>,
    /// Optional expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared on revocation.
    pub active: bool,
}

impl RoleAssignment {
    /// Creates an active assignment granted now.
    pub fn new(
        user_id: impl Into<UserId>,
        service: impl Into<ServiceName>,
        role: impl Into<String>,
        granted_by: impl Into<UserId>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            service: service.into(),
            role: role.into(),
            granted_by: granted_by.into(),
            granted_at: Utc::now(),
            expires_at: None,
            active: true,
        }
    }

    /// Sets the expiry.
    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// An assignment is active only when its flag is set and it has not expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |expires| expires > now)
    }
}
