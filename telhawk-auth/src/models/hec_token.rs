//! Machine (HEC) token model - long-lived ingestion credentials.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::new_id;

/// Visible prefix/suffix length of a masked token.
const MASK_VISIBLE: usize = 8;

/// Machine token entity, keyed by the opaque token string.
///
/// The client reference is required and determines the data-isolation scope
/// the token carries.
#[derive(Debug, Clone, FromRow)]
pub struct HecToken {
    pub id: Uuid,
    pub token: String,
    pub name: String,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub created_by: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl HecToken {
    pub fn new(
        token: String,
        name: String,
        user_id: Uuid,
        client_id: Uuid,
        created_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: new_id(),
            token,
            name,
            user_id,
            client_id,
            created_by,
            expires_at,
            disabled_at: None,
            revoked_at: None,
        }
    }

    /// Active iff neither disabled nor revoked and not past expiry.
    pub fn is_active(&self) -> bool {
        if self.disabled_at.is_some() || self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => expiry > Utc::now(),
            None => true,
        }
    }

    /// Masked form exposed on every read after creation:
    /// `first8 ∥ "..." ∥ last8`. Tokens of 16 chars or fewer are returned
    /// unmasked.
    pub fn masked(&self) -> String {
        mask_token(&self.token)
    }
}

/// Mask an opaque secret for display.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= MASK_VISIBLE * 2 {
        return token.to_string();
    }
    let head: String = chars[..MASK_VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - MASK_VISIBLE..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Masked representation for API responses.
#[derive(Debug, Serialize)]
pub struct HecTokenResponse {
    pub id: Uuid,
    pub token: String,
    pub name: String,
    pub client_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl HecTokenResponse {
    pub fn masked(token: &HecToken, owner_username: Option<String>) -> Self {
        Self {
            id: token.id,
            token: token.masked(),
            name: token.name.clone(),
            client_id: token.client_id,
            owner_username,
            expires_at: token.expires_at,
            active: token.is_active(),
        }
    }
}
