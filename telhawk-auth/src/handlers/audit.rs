//! Audit inspection endpoint for operators.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use telhawk_core::error::AppError;

use crate::models::AuditRecord;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /audit/events: newest-first page of signed audit records.
pub async fn list_audit_events(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records: Vec<AuditRecord> = state.db.list_audit_records(limit).await?;
    Ok(Json(serde_json::json!({ "data": records })))
}
