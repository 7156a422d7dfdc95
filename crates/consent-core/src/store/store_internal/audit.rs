//! Status audit row operations. Append-only: no update or delete path
//! exists in this module.

use crate::errors::ConsentError;
use crate::model::{AuditSearchFilter, ConsentStatusAuditRecord};
use crate::search::PredicateBuilder;
use crate::store::rows::{audit_from_row, to_epoch, AUDIT_COLUMNS};
use rusqlite::{params, params_from_iter, Connection};

pub(crate) fn insert_audit_impl(
    conn: &Connection,
    record: &ConsentStatusAuditRecord,
) -> Result<(), ConsentError> {
    conn.execute(
        r#"
        INSERT INTO consent_status_audit (
            status_audit_id, consent_id, current_status, previous_status,
            action_time, action_by, reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            record.status_audit_id,
            record.consent_id,
            record.current_status,
            record.previous_status,
            to_epoch(record.action_time),
            record.action_by,
            record.reason,
        ],
    )?;
    Ok(())
}

pub(crate) fn search_audit_impl(
    conn: &Connection,
    filter: &AuditSearchFilter,
) -> Result<Vec<ConsentStatusAuditRecord>, ConsentError> {
    let mut builder = PredicateBuilder::new();
    if let Some(consent_id) = &filter.consent_id {
        builder.eq("consent_id", consent_id.as_str());
    }
    if let Some(status) = &filter.status {
        builder.eq("current_status", status.as_str());
    }
    if let Some(action_by) = &filter.action_by {
        builder.eq("action_by", action_by.as_str());
    }
    if let Some(status_audit_id) = &filter.status_audit_id {
        builder.eq("status_audit_id", status_audit_id.as_str());
    }
    builder.time_range(
        "action_time",
        filter.from_time.map(to_epoch),
        filter.to_time.map(to_epoch),
    );
    let predicate = builder.build();

    let sql = format!(
        "SELECT {AUDIT_COLUMNS} FROM consent_status_audit{} \
         ORDER BY action_time ASC, rowid ASC",
        predicate.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(predicate.binds().iter()), audit_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub(crate) fn page_audit_impl(
    conn: &Connection,
    consent_ids: &[String],
    limit: u32,
    offset: u32,
) -> Result<Vec<ConsentStatusAuditRecord>, ConsentError> {
    let mut builder = PredicateBuilder::new();
    builder.or_chain("consent_id", consent_ids);
    let predicate = builder.build();
    let mut binds: Vec<crate::search::BindValue> = predicate.binds().to_vec();
    binds.push((limit as i64).into());
    binds.push((offset as i64).into());

    let sql = format!(
        "SELECT {AUDIT_COLUMNS} FROM consent_status_audit{} \
         ORDER BY action_time ASC, rowid ASC LIMIT ? OFFSET ?",
        predicate.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(binds.iter()), audit_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub(crate) fn count_audit_impl(conn: &Connection, consent_id: &str) -> Result<u64, ConsentError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM consent_status_audit WHERE consent_id = ?1",
        [consent_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
