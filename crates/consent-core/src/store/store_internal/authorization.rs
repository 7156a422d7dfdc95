//! Authorization row operations.

use crate::errors::ConsentError;
use crate::model::{AuthorizationResource, AuthorizationUpdate};
use crate::store::rows::{authorization_from_row, to_epoch, AUTHORIZATION_COLUMNS};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub(crate) fn insert_authorization_impl(
    conn: &Connection,
    auth: &AuthorizationResource,
) -> Result<(), ConsentError> {
    conn.execute(
        r#"
        INSERT INTO authorization (
            auth_id, consent_id, user_id, auth_status, auth_type, updated_time
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            auth.auth_id,
            auth.consent_id,
            auth.user_id,
            auth.auth_status,
            auth.auth_type,
            to_epoch(auth.updated_time),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_authorization_impl(
    conn: &Connection,
    auth_id: &str,
    org_id: &str,
) -> Result<Option<AuthorizationResource>, ConsentError> {
    let auth = conn
        .query_row(
            "SELECT a.auth_id, a.consent_id, a.user_id, a.auth_status, a.auth_type, a.updated_time \
             FROM authorization a JOIN consent c ON c.consent_id = a.consent_id \
             WHERE a.auth_id = ?1 AND c.org_id = ?2",
            params![auth_id, org_id],
            authorization_from_row,
        )
        .optional()?;
    Ok(auth)
}

pub(crate) fn update_authorization_impl(
    conn: &Connection,
    auth_id: &str,
    update: &AuthorizationUpdate,
    now: DateTime<Utc>,
) -> Result<usize, ConsentError> {
    let changed = conn.execute(
        "UPDATE authorization \
         SET user_id = ?1, auth_status = ?2, auth_type = ?3, updated_time = ?4 \
         WHERE auth_id = ?5",
        params![
            update.user_id,
            update.auth_status,
            update.auth_type,
            to_epoch(now),
            auth_id,
        ],
    )?;
    Ok(changed)
}

/// Deletes an authorization and its mappings. Returns false when no such
/// authorization exists.
pub(crate) fn delete_authorization_impl(
    conn: &Connection,
    auth_id: &str,
) -> Result<bool, ConsentError> {
    conn.execute("DELETE FROM consent_mapping WHERE auth_id = ?1", [auth_id])?;
    let deleted = conn.execute("DELETE FROM authorization WHERE auth_id = ?1", [auth_id])?;
    Ok(deleted > 0)
}

pub(crate) fn list_authorizations_impl(
    conn: &Connection,
    consent_id: &str,
) -> Result<Vec<AuthorizationResource>, ConsentError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUTHORIZATION_COLUMNS} FROM authorization \
         WHERE consent_id = ?1 ORDER BY auth_id"
    ))?;
    let auths = stmt
        .query_map([consent_id], authorization_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(auths)
}

/// Moves every non-terminal authorization of a consent to `new_status`.
/// Returns the affected auth ids. Runs inside the caller's transaction.
pub(crate) fn revoke_authorizations_impl(
    conn: &Connection,
    consent_id: &str,
    new_status: &str,
    terminal_statuses: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<String>, ConsentError> {
    let auths = list_authorizations_impl(conn, consent_id)?;
    let targets: Vec<String> = auths
        .into_iter()
        .filter(|a| !terminal_statuses.iter().any(|s| s == &a.auth_status))
        .map(|a| a.auth_id)
        .collect();

    for auth_id in &targets {
        conn.execute(
            "UPDATE authorization SET auth_status = ?1, updated_time = ?2 WHERE auth_id = ?3",
            params![new_status, to_epoch(now), auth_id],
        )?;
    }
    Ok(targets)
}
