//! Organization and client models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Organization entity (versioned).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: Uuid,
    pub version_id: Uuid,
    pub name: String,
    pub slug: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Organization {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Client entity (versioned). Carries its owning organization; the
/// containment relation authorizes cross-tier operations.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub version_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub slug: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Client {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
