//! Data models for the TelHawk auth service.
//!
//! PostgreSQL-backed entities following the platform schema:
//! - Versioned principals, roles, organizations, and clients
//!   (`(id, version_id)` pairs, latest version wins)
//! - Append-only sessions, machine tokens, role grants, and audit records
//! - Time-ordered UUIDv7 ids throughout

pub mod audit_event;
pub mod hec_token;
pub mod organization;
pub mod role;
pub mod session;
pub mod user;

// Re-export main types for convenience
pub use audit_event::{AuditOutcome, AuditRecord};
pub use hec_token::{mask_token, HecToken, HecTokenResponse};
pub use organization::{Client, Organization};
pub use role::{Permission, Role, RoleGrant, NO_ROLE_ORDINAL};
pub use session::Session;
pub use user::{ScopeType, User};
