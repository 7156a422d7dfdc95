//! Amendment history row operations. Snapshots are persisted verbatim as
//! JSON and never updated.

use crate::errors::ConsentError;
use crate::model::{ConsentHistoryResource, DetailedConsentResource};
use crate::store::rows::{from_epoch, to_epoch};
use rusqlite::{params, Connection};

pub(crate) fn insert_history_impl(
    conn: &Connection,
    history: &ConsentHistoryResource,
) -> Result<(), ConsentError> {
    let snapshot_json = serde_json::to_string(&history.detailed_consent)?;
    conn.execute(
        r#"
        INSERT INTO consent_amendment_history (
            history_id, consent_id, amended_time, reason,
            snapshot_json, snapshot_digest
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            history.history_id,
            history.consent_id,
            to_epoch(history.amended_time),
            history.reason,
            snapshot_json,
            history.snapshot_digest,
        ],
    )?;
    Ok(())
}

/// Snapshots for one consent, most recent amendment first.
pub(crate) fn list_history_impl(
    conn: &Connection,
    consent_id: &str,
) -> Result<Vec<ConsentHistoryResource>, ConsentError> {
    let mut stmt = conn.prepare(
        "SELECT history_id, consent_id, amended_time, reason, snapshot_json, snapshot_digest \
         FROM consent_amendment_history WHERE consent_id = ?1 \
         ORDER BY amended_time DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([consent_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (history_id, consent_id, amended_time, reason, snapshot_json, snapshot_digest) in rows {
        let detailed_consent: DetailedConsentResource = serde_json::from_str(&snapshot_json)?;
        out.push(ConsentHistoryResource {
            history_id,
            consent_id,
            amended_time: from_epoch(amended_time),
            reason,
            detailed_consent,
            snapshot_digest,
        });
    }
    Ok(out)
}

pub(crate) fn count_history_impl(conn: &Connection, consent_id: &str) -> Result<u64, ConsentError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM consent_amendment_history WHERE consent_id = ?1",
        [consent_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
