//! Auth endpoint request/response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::ScopeType;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token pair returned after successful credential or refresh exchange.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RevokeRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

/// Result of the internal token check. Everything past `valid` is absent
/// when the token is rejected.
#[derive(Debug, Default, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_permissions_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_stale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ValidateResponse {
    pub fn invalid() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
pub struct HecValidateRequest {
    pub token: String,
}

#[derive(Debug, Default, Serialize)]
pub struct HecValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl HecValidateResponse {
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Scope picker: the organizations and clients the caller may target.
#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub scope_type: ScopeType,
    pub organizations: Vec<ScopeOrganization>,
}

#[derive(Debug, Serialize)]
pub struct ScopeOrganization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub clients: Vec<ScopeClient>,
}

#[derive(Debug, Serialize)]
pub struct ScopeClient {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_validate_response_serializes_to_bare_valid_false() {
        let json = serde_json::to_value(ValidateResponse::invalid()).unwrap();
        assert_eq!(json, serde_json::json!({"valid": false}));
    }

    #[test]
    fn login_request_requires_both_fields() {
        let request = LoginRequest {
            username: String::new(),
            password: "p".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
