//! Time-ordered identifiers.
//!
//! Every table keys on a UUIDv7, so a row's id encodes its creation instant
//! and `ORDER BY id DESC` is newest-first without a separate timestamp index.
//! Versioned tables reuse the same scheme for `version_id`, making the latest
//! version the one with the greatest `version_id`.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a fresh time-ordered id.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Recover the creation instant embedded in a time-ordered id.
///
/// Returns `None` for ids that are not version 7.
pub fn id_timestamp(id: Uuid) -> Option<DateTime<Utc>> {
    let ts = id.get_timestamp()?;
    let (secs, nanos) = ts.to_unix();
    Utc.timestamp_opt(secs as i64, nanos).single()
}
