//! User (principal) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::RoleGrant;
use crate::utils::new_id;

/// Scope tier of a principal, derived from its primary references:
/// client-tier if a primary client is set, organization-tier if only a
/// primary organization is set, platform-tier if neither is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Platform,
    Organization,
    Client,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Platform => "platform",
            ScopeType::Organization => "organization",
            ScopeType::Client => "client",
        }
    }
}

impl std::str::FromStr for ScopeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(ScopeType::Platform),
            "organization" => Ok(ScopeType::Organization),
            "client" => Ok(ScopeType::Client),
            other => Err(format!("unknown scope type: {}", other)),
        }
    }
}

/// User entity (versioned principal).
///
/// `id` is stable across versions; `version_id` changes on every content
/// change. `permissions_version` is monotonically non-decreasing and is
/// bumped by any change to the effective permission set.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub version_id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub permissions_version: i64,
    pub disabled_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    #[sqlx(skip)]
    #[serde(skip_serializing)]
    pub grants: Vec<RoleGrant>,
}

impl User {
    /// Create a new principal. The fresh id doubles as the initial
    /// version id.
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        roles: Vec<String>,
        organization_id: Option<Uuid>,
        client_id: Option<Uuid>,
        created_by: Option<Uuid>,
    ) -> Self {
        let id = new_id();
        Self {
            id,
            version_id: id,
            username,
            email,
            password_hash,
            roles,
            organization_id,
            client_id,
            permissions_version: 1,
            disabled_at: None,
            deleted_at: None,
            created_by,
            updated_by: created_by,
            grants: Vec::new(),
        }
    }

    /// Only active principals may authenticate.
    pub fn is_active(&self) -> bool {
        self.disabled_at.is_none() && self.deleted_at.is_none()
    }

    /// Derived scope tier of the principal.
    pub fn scope_type(&self) -> ScopeType {
        if self.client_id.is_some() {
            ScopeType::Client
        } else if self.organization_id.is_some() {
            ScopeType::Organization
        } else {
            ScopeType::Platform
        }
    }

    /// Active role grants, in load order.
    pub fn active_grants(&self) -> impl Iterator<Item = &RoleGrant> {
        self.grants.iter().filter(|g| g.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_scope(org: Option<Uuid>, client: Option<Uuid>) -> User {
        User::new(
            "tester".to_string(),
            "tester@example.com".to_string(),
            "$2b$04$hash".to_string(),
            vec!["viewer".to_string()],
            org,
            client,
            None,
        )
    }

    #[test]
    fn scope_type_derivation() {
        assert_eq!(user_with_scope(None, None).scope_type(), ScopeType::Platform);
        assert_eq!(
            user_with_scope(Some(new_id()), None).scope_type(),
            ScopeType::Organization
        );
        assert_eq!(
            user_with_scope(Some(new_id()), Some(new_id())).scope_type(),
            ScopeType::Client
        );
    }

    #[test]
    fn new_user_reuses_id_as_version_id() {
        let user = user_with_scope(None, None);
        assert_eq!(user.id, user.version_id);
        assert_eq!(user.permissions_version, 1);
    }

    #[test]
    fn lifecycle_markers_gate_activity() {
        let mut user = user_with_scope(None, None);
        assert!(user.is_active());
        user.disabled_at = Some(Utc::now());
        assert!(!user.is_active());
        user.disabled_at = None;
        user.deleted_at = Some(Utc::now());
        assert!(!user.is_active());
    }
}
