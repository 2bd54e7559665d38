//! Audit record model - signed append-only security log.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::new_id;

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }
}

/// Audit record entity. Never mutated after append.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub actor_type: String,
    pub actor_id: Option<Uuid>,
    pub actor_username: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub source_ip: String,
    pub user_agent: String,
    pub result: String,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
    pub signature: String,
}

impl AuditRecord {
    /// Build an unsigned record stamped with a fresh time-ordered id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor_type: String,
        actor_id: Option<Uuid>,
        actor_username: String,
        action: String,
        resource_type: String,
        resource_id: String,
        source_ip: String,
        user_agent: String,
        outcome: AuditOutcome,
        reason: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
            actor_type,
            actor_id,
            actor_username,
            action,
            resource_type,
            resource_id,
            source_ip,
            user_agent,
            result: outcome.as_str().to_string(),
            reason,
            metadata,
            signature: String::new(),
        }
    }

    /// Canonical byte string the HMAC signature covers:
    /// id ∥ RFC3339-nanosecond timestamp ∥ actor id ∥ action ∥ resource type
    /// ∥ outcome, pipe-separated.
    pub fn canonical_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.id,
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.actor_id.map(|id| id.to_string()).unwrap_or_default(),
            self.action,
            self.resource_type,
            self.result,
        )
    }
}
