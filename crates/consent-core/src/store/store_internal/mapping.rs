//! Consent mapping row operations.

use crate::errors::ConsentError;
use crate::model::ConsentMappingResource;
use crate::store::rows::{mapping_from_row, MAPPING_COLUMNS};
use rusqlite::{params, Connection};

pub(crate) fn insert_mapping_impl(
    conn: &Connection,
    mapping: &ConsentMappingResource,
) -> Result<(), ConsentError> {
    conn.execute(
        r#"
        INSERT INTO consent_mapping (
            mapping_id, auth_id, account_id, permission, mapping_status
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            mapping.mapping_id,
            mapping.auth_id,
            mapping.account_id,
            mapping.permission,
            mapping.mapping_status,
        ],
    )?;
    Ok(())
}

pub(crate) fn list_mappings_for_consent_impl(
    conn: &Connection,
    consent_id: &str,
) -> Result<Vec<ConsentMappingResource>, ConsentError> {
    let mut stmt = conn.prepare(
        "SELECT m.mapping_id, m.auth_id, m.account_id, m.permission, m.mapping_status \
         FROM consent_mapping m JOIN authorization a ON a.auth_id = m.auth_id \
         WHERE a.consent_id = ?1 ORDER BY m.mapping_id",
    )?;
    let mappings = stmt
        .query_map([consent_id], mapping_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(mappings)
}

pub(crate) fn list_mappings_for_auth_impl(
    conn: &Connection,
    auth_id: &str,
) -> Result<Vec<ConsentMappingResource>, ConsentError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MAPPING_COLUMNS} FROM consent_mapping WHERE auth_id = ?1 ORDER BY mapping_id"
    ))?;
    let mappings = stmt
        .query_map([auth_id], mapping_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(mappings)
}

pub(crate) fn update_mapping_status_impl(
    conn: &Connection,
    mapping_ids: &[String],
    new_status: &str,
) -> Result<usize, ConsentError> {
    let mut changed = 0;
    for mapping_id in mapping_ids {
        changed += conn.execute(
            "UPDATE consent_mapping SET mapping_status = ?1 WHERE mapping_id = ?2",
            params![new_status, mapping_id],
        )?;
    }
    Ok(changed)
}

/// Moves every mapping of a consent not already in `new_status` to
/// `new_status`. Returns the affected mapping ids. Runs inside the
/// caller's transaction.
pub(crate) fn revoke_mappings_impl(
    conn: &Connection,
    consent_id: &str,
    new_status: &str,
) -> Result<Vec<String>, ConsentError> {
    let mappings = list_mappings_for_consent_impl(conn, consent_id)?;
    let targets: Vec<String> = mappings
        .into_iter()
        .filter(|m| m.mapping_status != new_status)
        .map(|m| m.mapping_id)
        .collect();

    for mapping_id in &targets {
        conn.execute(
            "UPDATE consent_mapping SET mapping_status = ?1 WHERE mapping_id = ?2",
            params![new_status, mapping_id],
        )?;
    }
    Ok(targets)
}
