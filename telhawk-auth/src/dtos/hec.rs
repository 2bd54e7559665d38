//! Machine-token endpoint request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHecTokenRequest {
    #[validate(length(min = 1, max = 128, message = "Token name is required"))]
    pub name: String,
    /// Required: determines the data-isolation scope the token carries.
    pub client_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Creation response: the only place the full secret ever appears.
#[derive(Debug, Serialize)]
pub struct CreateHecTokenAttributes {
    pub token: String,
    pub name: String,
    pub client_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RevokeHecTokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}
