//! Consent row operations.

use crate::errors::ConsentError;
use crate::model::{BulkStatusUpdate, ConsentResource};
use crate::store::rows::{consent_from_row, to_epoch, CONSENT_COLUMNS};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub(crate) fn insert_consent_impl(
    conn: &Connection,
    consent: &ConsentResource,
) -> Result<(), ConsentError> {
    conn.execute(
        r#"
        INSERT INTO consent (
            consent_id, org_id, client_id, receipt, consent_type,
            current_status, consent_frequency, validity_period,
            recurring_indicator, created_time, updated_time
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            consent.consent_id,
            consent.org_id,
            consent.client_id,
            consent.receipt,
            consent.consent_type,
            consent.current_status,
            consent.consent_frequency as i64,
            consent.validity_period,
            consent.recurring_indicator as i64,
            to_epoch(consent.created_time),
            to_epoch(consent.updated_time),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_consent_impl(
    conn: &Connection,
    consent_id: &str,
    org_id: &str,
) -> Result<Option<ConsentResource>, ConsentError> {
    let consent = conn
        .query_row(
            &format!("SELECT {CONSENT_COLUMNS} FROM consent WHERE consent_id = ?1 AND org_id = ?2"),
            params![consent_id, org_id],
            consent_from_row,
        )
        .optional()?;
    Ok(consent)
}

pub(crate) fn consent_exists_impl(
    conn: &Connection,
    consent_id: &str,
) -> Result<bool, ConsentError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM consent WHERE consent_id = ?1",
        [consent_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Read the current status for a transition. Must run inside the same
/// write transaction as the update so the audit row records the actual
/// previous value, never a stale one.
pub(crate) fn read_status_for_update_impl(
    conn: &Connection,
    consent_id: &str,
    org_id: &str,
) -> Result<Option<String>, ConsentError> {
    let status = conn
        .query_row(
            "SELECT current_status FROM consent WHERE consent_id = ?1 AND org_id = ?2",
            params![consent_id, org_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(status)
}

pub(crate) fn update_status_impl(
    conn: &Connection,
    consent_id: &str,
    new_status: &str,
    now: DateTime<Utc>,
) -> Result<usize, ConsentError> {
    let changed = conn.execute(
        "UPDATE consent SET current_status = ?1, updated_time = ?2 WHERE consent_id = ?3",
        params![new_status, to_epoch(now), consent_id],
    )?;
    Ok(changed)
}

pub(crate) fn update_validity_impl(
    conn: &Connection,
    consent_id: &str,
    org_id: &str,
    validity_period: i64,
    now: DateTime<Utc>,
) -> Result<usize, ConsentError> {
    let changed = conn.execute(
        "UPDATE consent SET validity_period = ?1, updated_time = ?2 \
         WHERE consent_id = ?3 AND org_id = ?4",
        params![validity_period, to_epoch(now), consent_id, org_id],
    )?;
    Ok(changed)
}

/// Cascade delete of the operational rows for one consent: mappings,
/// authorizations, attributes, then the consent itself. Audit and history
/// rows are not touched. Returns false when the consent did not exist.
pub(crate) fn delete_consent_rows_impl(
    conn: &Connection,
    consent_id: &str,
) -> Result<bool, ConsentError> {
    conn.execute(
        "DELETE FROM consent_mapping WHERE auth_id IN \
         (SELECT auth_id FROM authorization WHERE consent_id = ?1)",
        [consent_id],
    )?;
    conn.execute("DELETE FROM authorization WHERE consent_id = ?1", [consent_id])?;
    conn.execute(
        "DELETE FROM consent_attribute WHERE consent_id = ?1",
        [consent_id],
    )?;
    let deleted = conn.execute("DELETE FROM consent WHERE consent_id = ?1", [consent_id])?;
    Ok(deleted > 0)
}

/// Consents matched by a bulk transition: same org, client and type, and a
/// current status in the applicable set. Returns `(consent_id, current_status)`
/// pairs so each audit row can carry its own previous value.
pub(crate) fn select_bulk_candidates_impl(
    conn: &Connection,
    update: &BulkStatusUpdate,
) -> Result<Vec<(String, String)>, ConsentError> {
    let mut stmt = conn.prepare(
        "SELECT consent_id, current_status FROM consent \
         WHERE org_id = ?1 AND client_id = ?2 AND consent_type = ?3 \
         ORDER BY consent_id",
    )?;
    let rows = stmt
        .query_map(
            params![update.org_id, update.client_id, update.consent_type],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter(|(_, status)| update.applicable_statuses.iter().any(|s| s == status))
        .collect())
}

/// Non-terminal consents whose validity window has elapsed.
pub(crate) fn select_expiry_candidates_impl(
    conn: &Connection,
    org_id: &str,
    now: DateTime<Utc>,
    terminal_statuses: &[String],
) -> Result<Vec<(String, String)>, ConsentError> {
    let mut stmt = conn.prepare(
        "SELECT consent_id, current_status FROM consent \
         WHERE org_id = ?1 AND validity_period > 0 \
           AND created_time + validity_period <= ?2 \
         ORDER BY consent_id",
    )?;
    let rows = stmt
        .query_map(params![org_id, to_epoch(now)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter(|(_, status)| !terminal_statuses.iter().any(|s| s == status))
        .collect())
}

pub(crate) fn count_consents_impl(conn: &Connection, org_id: &str) -> Result<u64, ConsentError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM consent WHERE org_id = ?1",
        [org_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
