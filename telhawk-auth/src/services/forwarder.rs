//! OCSF event forwarder.
//!
//! Maps audit records to Open Cybersecurity Schema Framework authentication
//! events (class_uid 3002, category_uid 3), wraps them in a HEC envelope,
//! and POSTs them to the configured collector. No retries; a forwarder
//! outage drops events.

use serde::Serialize;
use std::time::Duration;

use crate::config::ForwardConfig;
use crate::models::AuditRecord;
use crate::services::ServiceError;

const OCSF_CLASS_AUTHENTICATION: u32 = 3002;
const OCSF_CATEGORY_IAM: u32 = 3;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// OCSF authentication activity ids.
const ACTIVITY_LOGON: u32 = 1;
const ACTIVITY_LOGOFF: u32 = 2;
const ACTIVITY_TICKET: u32 = 3;
const ACTIVITY_OTHER: u32 = 99;

/// OCSF authentication event payload.
#[derive(Debug, Serialize)]
pub struct OcsfAuthentication {
    pub activity_id: u32,
    pub category_uid: u32,
    pub class_uid: u32,
    pub severity: &'static str,
    pub severity_id: u32,
    pub status: &'static str,
    pub status_id: u32,
    pub time: i64,
    pub user: OcsfUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_endpoint: Option<OcsfEndpoint>,
    pub metadata: OcsfMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OcsfUser {
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Serialize)]
pub struct OcsfEndpoint {
    pub ip: String,
    pub observables: Vec<OcsfObservable>,
}

#[derive(Debug, Serialize)]
pub struct OcsfObservable {
    pub name: &'static str,
    pub value: String,
    pub type_id: u32,
}

#[derive(Debug, Serialize)]
pub struct OcsfMetadata {
    pub product: OcsfProduct,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct OcsfProduct {
    pub name: &'static str,
    pub vendor_name: &'static str,
}

/// HEC envelope around one OCSF event.
#[derive(Debug, Serialize)]
pub struct HecEnvelope {
    pub time: i64,
    pub host: String,
    pub source: &'static str,
    pub sourcetype: &'static str,
    pub event: OcsfAuthentication,
}

/// Map an action token to an OCSF authentication activity id.
fn activity_id(action: &str) -> u32 {
    match action {
        "login" => ACTIVITY_LOGON,
        "logout" | "token_revoke" => ACTIVITY_LOGOFF,
        "hec_token_create" => ACTIVITY_TICKET,
        _ => ACTIVITY_OTHER,
    }
}

/// Severity mapping: successes are informational, failed logins stand out,
/// other failures are low.
fn severity(action: &str, result: &str) -> (&'static str, u32) {
    if result == "success" {
        ("Informational", 1)
    } else if action == "login" {
        ("Medium", 3)
    } else {
        ("Low", 2)
    }
}

/// Build the OCSF authentication event for one audit record.
pub fn build_event(record: &AuditRecord) -> OcsfAuthentication {
    let (severity, severity_id) = severity(&record.action, &record.result);
    let (status, status_id) = if record.result == "success" {
        ("Success", 1)
    } else {
        ("Failure", 2)
    };

    let src_endpoint = if record.source_ip.is_empty() {
        None
    } else {
        Some(OcsfEndpoint {
            ip: record.source_ip.clone(),
            observables: vec![OcsfObservable {
                name: "src_endpoint.ip",
                value: record.source_ip.clone(),
                // OCSF observable type 2 = IP Address
                type_id: 2,
            }],
        })
    };

    OcsfAuthentication {
        activity_id: activity_id(&record.action),
        category_uid: OCSF_CATEGORY_IAM,
        class_uid: OCSF_CLASS_AUTHENTICATION,
        severity,
        severity_id,
        status,
        status_id,
        time: record.created_at.timestamp_millis(),
        user: OcsfUser {
            name: record.actor_username.clone(),
            uid: record
                .actor_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        },
        src_endpoint,
        metadata: OcsfMetadata {
            product: OcsfProduct {
                name: "telhawk-auth",
                vendor_name: "TelHawk",
            },
            version: "1.1.0",
        },
        status_detail: record.reason.clone(),
    }
}

/// Forwarder over a shared HTTP client.
pub struct OcsfForwarder {
    client: reqwest::Client,
    url: String,
    token: String,
    host: String,
}

impl OcsfForwarder {
    pub fn new(config: &ForwardConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("failed to build forward client: {}", e))
            })?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
            host: hostname(),
        })
    }

    /// Wrap and POST one record. One attempt; failures are surfaced to the
    /// caller, which logs and drops them.
    pub async fn forward(&self, record: &AuditRecord) -> Result<(), ServiceError> {
        let envelope = HecEnvelope {
            time: record.created_at.timestamp(),
            host: self.host.clone(),
            source: "telhawk:auth",
            sourcetype: "ocsf:authentication",
            event: build_event(record),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Splunk {}", self.token))
            .json(&envelope)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("forward failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "forward rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "telhawk-auth".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditOutcome;
    use crate::utils::new_id;

    fn record(action: &str, outcome: AuditOutcome, source_ip: &str) -> AuditRecord {
        AuditRecord::new(
            "platform".to_string(),
            Some(new_id()),
            "alice".to_string(),
            action.to_string(),
            "session".to_string(),
            "s1".to_string(),
            source_ip.to_string(),
            "curl/8".to_string(),
            outcome,
            None,
            serde_json::json!({}),
        )
    }

    #[test]
    fn activity_mapping_follows_the_action() {
        assert_eq!(activity_id("login"), 1);
        assert_eq!(activity_id("logout"), 2);
        assert_eq!(activity_id("token_revoke"), 2);
        assert_eq!(activity_id("hec_token_create"), 3);
        assert_eq!(activity_id("user_create"), 99);
    }

    #[test]
    fn severity_mapping_distinguishes_failed_logins() {
        assert_eq!(severity("login", "success"), ("Informational", 1));
        assert_eq!(severity("user_create", "success"), ("Informational", 1));
        assert_eq!(severity("login", "failure"), ("Medium", 3));
        assert_eq!(severity("token_revoke", "failure"), ("Low", 2));
    }

    #[test]
    fn event_carries_class_and_category() {
        let event = build_event(&record("login", AuditOutcome::Success, "10.0.0.1"));
        assert_eq!(event.class_uid, 3002);
        assert_eq!(event.category_uid, 3);
        assert_eq!(event.status_id, 1);
        assert_eq!(event.user.name, "alice");

        let endpoint = event.src_endpoint.expect("source endpoint");
        assert_eq!(endpoint.ip, "10.0.0.1");
        assert_eq!(endpoint.observables.len(), 1);
    }

    #[test]
    fn missing_source_ip_omits_the_endpoint() {
        let event = build_event(&record("login", AuditOutcome::Failure, ""));
        assert!(event.src_endpoint.is_none());
        assert_eq!(event.status_id, 2);
    }

    #[test]
    fn envelope_serializes_with_hec_fields() {
        let rec = record("login", AuditOutcome::Success, "10.0.0.1");
        let envelope = HecEnvelope {
            time: rec.created_at.timestamp(),
            host: "test-host".to_string(),
            source: "telhawk:auth",
            sourcetype: "ocsf:authentication",
            event: build_event(&rec),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["source"], "telhawk:auth");
        assert_eq!(json["sourcetype"], "ocsf:authentication");
        assert_eq!(json["event"]["class_uid"], 3002);
    }
}
