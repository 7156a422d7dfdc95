//! Row mapping between SQLite and model types.
//!
//! Time columns are epoch seconds (`INTEGER`) so range predicates compare
//! numerically; conversion to `DateTime<Utc>` happens here.

use crate::model::{
    AuthorizationResource, ConsentMappingResource, ConsentResource, ConsentStatusAuditRecord,
};
use chrono::{DateTime, Utc};

pub(crate) fn to_epoch(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub(crate) fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Column order: consent_id, org_id, client_id, receipt, consent_type,
/// current_status, consent_frequency, validity_period, recurring_indicator,
/// created_time, updated_time.
pub(crate) const CONSENT_COLUMNS: &str = "consent_id, org_id, client_id, receipt, consent_type, \
     current_status, consent_frequency, validity_period, recurring_indicator, \
     created_time, updated_time";

pub(crate) fn consent_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConsentResource> {
    Ok(ConsentResource {
        consent_id: row.get(0)?,
        org_id: row.get(1)?,
        client_id: row.get(2)?,
        receipt: row.get(3)?,
        consent_type: row.get(4)?,
        current_status: row.get(5)?,
        consent_frequency: row.get::<_, i64>(6)? as u32,
        validity_period: row.get(7)?,
        recurring_indicator: row.get::<_, i64>(8)? != 0,
        created_time: from_epoch(row.get(9)?),
        updated_time: from_epoch(row.get(10)?),
    })
}

/// Column order: auth_id, consent_id, user_id, auth_status, auth_type,
/// updated_time.
pub(crate) const AUTHORIZATION_COLUMNS: &str =
    "auth_id, consent_id, user_id, auth_status, auth_type, updated_time";

pub(crate) fn authorization_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<AuthorizationResource> {
    Ok(AuthorizationResource {
        auth_id: row.get(0)?,
        consent_id: row.get(1)?,
        user_id: row.get(2)?,
        auth_status: row.get(3)?,
        auth_type: row.get(4)?,
        updated_time: from_epoch(row.get(5)?),
    })
}

/// Column order: mapping_id, auth_id, account_id, permission, mapping_status.
pub(crate) const MAPPING_COLUMNS: &str =
    "mapping_id, auth_id, account_id, permission, mapping_status";

pub(crate) fn mapping_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<ConsentMappingResource> {
    Ok(ConsentMappingResource {
        mapping_id: row.get(0)?,
        auth_id: row.get(1)?,
        account_id: row.get(2)?,
        permission: row.get(3)?,
        mapping_status: row.get(4)?,
    })
}

/// Column order: status_audit_id, consent_id, current_status,
/// previous_status, action_time, action_by, reason.
pub(crate) const AUDIT_COLUMNS: &str =
    "status_audit_id, consent_id, current_status, previous_status, action_time, action_by, reason";

pub(crate) fn audit_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<ConsentStatusAuditRecord> {
    Ok(ConsentStatusAuditRecord {
        status_audit_id: row.get(0)?,
        consent_id: row.get(1)?,
        current_status: row.get(2)?,
        previous_status: row.get(3)?,
        action_time: from_epoch(row.get(4)?),
        action_by: row.get(5)?,
        reason: row.get(6)?,
    })
}
