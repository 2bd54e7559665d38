//! User endpoint request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{ScopeType, User};
use crate::utils::ids::id_timestamp;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

/// User attributes for API responses; no credential material.
#[derive(Debug, Serialize)]
pub struct UserAttributes {
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub scope_type: ScopeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    pub permissions_version: i64,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserAttributes {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            scope_type: user.scope_type(),
            organization_id: user.organization_id,
            client_id: user.client_id,
            permissions_version: user.permissions_version,
            disabled: user.disabled_at.is_some(),
            created_at: id_timestamp(user.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_short_passwords() {
        let request = CreateUserRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "short".to_string(),
            roles: vec![],
            organization_id: None,
            client_id: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn user_attributes_never_carry_the_hash() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "$2b$04$secret-hash".to_string(),
            vec!["viewer".to_string()],
            None,
            None,
            None,
        );
        let json = serde_json::to_string(&UserAttributes::from(&user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("alice"));
    }
}
