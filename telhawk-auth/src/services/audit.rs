//! Audit logger.
//!
//! Builds, signs, and persists audit records, and forwards the
//! security-relevant subset to the external event sink. Persistence runs on
//! its own task so a caller hanging up cannot cancel the write; forwarding
//! is fire-and-forget.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::models::{AuditOutcome, AuditRecord};
use crate::services::{Database, OcsfForwarder};

type HmacSha256 = Hmac<Sha256>;

/// Diagnostics buffer depth; oldest records are dropped past this.
const BUFFER_DEPTH: usize = 1024;

/// High-frequency operational actions that are persisted but never
/// forwarded. Suppressing `hec_token_validate` also breaks the loop where
/// validating the forwarder's own credential would re-enter the logger.
const SUPPRESSED_ACTIONS: &[&str] = &["token_validate", "token_refresh", "hec_token_validate"];

/// Unknown actions are forwarded by default.
pub fn should_forward(action: &str) -> bool {
    !SUPPRESSED_ACTIONS.contains(&action)
}

/// Sign the canonical payload of a record with HMAC-SHA-256, hex encoded.
pub fn sign_record(secret: &[u8], record: &AuditRecord) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(record.canonical_payload().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute and constant-time compare the signature.
pub fn verify_record(secret: &[u8], record: &AuditRecord) -> bool {
    let expected = sign_record(secret, record);
    expected.as_bytes().ct_eq(record.signature.as_bytes()).into()
}

/// Audit logger shared across the service layer.
#[derive(Clone)]
pub struct AuditLogger {
    db: Database,
    secret: Arc<Vec<u8>>,
    buffer: Arc<Mutex<VecDeque<AuditRecord>>>,
    forwarder: Option<Arc<OcsfForwarder>>,
}

impl AuditLogger {
    pub fn new(db: Database, secret: &str, forwarder: Option<Arc<OcsfForwarder>>) -> Self {
        Self {
            db,
            secret: Arc::new(secret.as_bytes().to_vec()),
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(BUFFER_DEPTH))),
            forwarder,
        }
    }

    /// Record one security-relevant operation.
    ///
    /// The database write happens on a spawned task that the caller awaits:
    /// best effort, never fails the triggering operation, and keeps running
    /// if the caller is cancelled mid-await. Forwarding never blocks the
    /// caller.
    #[allow(clippy::too_many_arguments)]
    pub async fn log(
        &self,
        actor_type: &str,
        actor_id: Option<Uuid>,
        actor_username: &str,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        source_ip: &str,
        user_agent: &str,
        outcome: AuditOutcome,
        reason: Option<String>,
        metadata: serde_json::Value,
    ) {
        let mut record = AuditRecord::new(
            actor_type.to_string(),
            actor_id,
            actor_username.to_string(),
            action.to_string(),
            resource_type.to_string(),
            resource_id.to_string(),
            source_ip.to_string(),
            user_agent.to_string(),
            outcome,
            reason,
            metadata,
        );
        record.signature = sign_record(&self.secret, &record);

        self.buffer_push(record.clone());

        if let Some(forwarder) = self.forwarder.as_ref() {
            if should_forward(action) {
                let forwarder = Arc::clone(forwarder);
                let forwarded = record.clone();
                tokio::spawn(async move {
                    if let Err(e) = forwarder.forward(&forwarded).await {
                        tracing::warn!(
                            action = %forwarded.action,
                            error = %e,
                            "audit forward dropped"
                        );
                    }
                });
            }
        }

        let db = self.db.clone();
        let persisted = record.clone();
        let write = tokio::spawn(async move {
            if let Err(e) = db.append_audit_record(&persisted).await {
                tracing::error!(
                    action = %persisted.action,
                    error = %e,
                    "failed to persist audit record"
                );
            }
        });
        // Await the detached write so records land in order for this
        // request; the task survives if this future is dropped.
        let _ = write.await;
    }

    /// Verify a record against the process-wide audit secret.
    pub fn verify(&self, record: &AuditRecord) -> bool {
        verify_record(&self.secret, record)
    }

    /// Most recent records, newest last. For tests and diagnostics.
    pub fn recent(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn buffer_push(&self, record: AuditRecord) {
        if let Ok(mut buffer) = self.buffer.lock() {
            if buffer.len() == BUFFER_DEPTH {
                buffer.pop_front();
            }
            buffer.push_back(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::new_id;

    fn record(action: &str) -> AuditRecord {
        AuditRecord::new(
            "platform".to_string(),
            Some(new_id()),
            "alice".to_string(),
            action.to_string(),
            "session".to_string(),
            "s1".to_string(),
            "10.0.0.1".to_string(),
            "curl/8".to_string(),
            AuditOutcome::Success,
            None,
            serde_json::json!({}),
        )
    }

    #[test]
    fn signature_verifies_roundtrip() {
        let secret = b"audit-secret";
        let mut rec = record("login");
        rec.signature = sign_record(secret, &rec);
        assert!(verify_record(secret, &rec));
    }

    #[test]
    fn tampering_any_signed_field_breaks_verification() {
        let secret = b"audit-secret";
        let mut rec = record("login");
        rec.signature = sign_record(secret, &rec);

        let mut tampered = rec.clone();
        tampered.action = "logout".to_string();
        assert!(!verify_record(secret, &tampered));

        let mut tampered = rec.clone();
        tampered.result = "failure".to_string();
        assert!(!verify_record(secret, &tampered));

        let mut tampered = rec.clone();
        tampered.actor_id = Some(new_id());
        assert!(!verify_record(secret, &tampered));
    }

    #[test]
    fn different_records_sign_differently() {
        let secret = b"audit-secret";
        assert_ne!(
            sign_record(secret, &record("login")),
            sign_record(secret, &record("logout"))
        );
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let mut rec = record("login");
        rec.signature = sign_record(b"right-secret", &rec);
        assert!(!verify_record(b"wrong-secret", &rec));
    }

    #[test]
    fn operational_actions_are_suppressed_from_forwarding() {
        assert!(!should_forward("token_validate"));
        assert!(!should_forward("token_refresh"));
        assert!(!should_forward("hec_token_validate"));

        assert!(should_forward("login"));
        assert!(should_forward("token_revoke"));
        // unknown actions forward by default
        assert!(should_forward("some_future_action"));
    }
}
