//! Session model - append-only refresh-token sessions.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::new_id;

/// Session entity, keyed by the opaque refresh token.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new session with the given absolute lifetime.
    pub fn new(user_id: Uuid, access_token: String, refresh_token: String, ttl_days: i64) -> Self {
        Self {
            id: new_id(),
            user_id,
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::days(ttl_days),
            revoked_at: None,
        }
    }

    /// A session is active iff revocation is unset and expiry is in the
    /// future.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }
}
