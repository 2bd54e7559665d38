//! Role, permission, and role-grant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::new_id;

/// Ordinal reported for a principal holding no active role grants.
/// Real roles use 0..=99, with 0 the most powerful, so the sentinel orders
/// below every real role.
pub const NO_ROLE_ORDINAL: i16 = 100;

/// Seeded permission entity. Canonical string form is `resource:action`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub resource: String,
    pub action: String,
}

impl Permission {
    /// Canonical `resource:action` key.
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }

    /// Check against a canonical `resource:action` literal.
    pub fn matches(&self, key: &str) -> bool {
        match key.split_once(':') {
            Some((resource, action)) => self.resource == resource && self.action == action,
            None => false,
        }
    }
}

/// Role entity (versioned).
///
/// The org/client pair determines the role's tier by the same rule as
/// principals. Protected roles may not be created, modified, or assigned
/// through the API.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: Uuid,
    pub version_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub ordinal: i16,
    pub protected: bool,
    pub system: bool,
    pub template: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// True if the role's permission set contains the canonical key.
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(permission))
    }
}

/// Append-only mapping of a principal to a role within a scope.
/// A grant is active iff it has not been revoked.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoleGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub revoked_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub role: Role,
}

impl RoleGrant {
    pub fn new(
        user_id: Uuid,
        role: Role,
        organization_id: Option<Uuid>,
        client_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: new_id(),
            user_id,
            role_id: role.id,
            organization_id,
            client_id,
            revoked_at: None,
            role,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

impl Default for Role {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            version_id: Uuid::nil(),
            organization_id: None,
            client_id: None,
            name: String::new(),
            slug: String::new(),
            ordinal: NO_ROLE_ORDINAL,
            protected: false,
            system: false,
            template: false,
            deleted_at: None,
            permissions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_key_is_resource_colon_action() {
        let p = Permission {
            id: new_id(),
            resource: "users".to_string(),
            action: "update".to_string(),
        };
        assert_eq!(p.key(), "users:update");
        assert!(p.matches("users:update"));
        assert!(!p.matches("users:delete"));
        assert!(!p.matches("users"));
    }

    #[test]
    fn role_grants_by_literal_pair() {
        let role = Role {
            permissions: vec![Permission {
                id: new_id(),
                resource: "tokens".to_string(),
                action: "create".to_string(),
            }],
            ..Role::default()
        };
        assert!(role.grants("tokens:create"));
        assert!(!role.grants("tokens:revoke"));
    }
}
