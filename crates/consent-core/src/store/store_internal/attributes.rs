//! Consent attribute row operations. Key/value sidecar scoped to one
//! consent id; keys unique per consent.

use crate::errors::ConsentError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

pub(crate) fn upsert_attributes_impl(
    conn: &Connection,
    consent_id: &str,
    attributes: &HashMap<String, String>,
) -> Result<(), ConsentError> {
    for (key, value) in attributes {
        conn.execute(
            r#"
            INSERT INTO consent_attribute (consent_id, att_key, att_value)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(consent_id, att_key) DO UPDATE SET
                att_value = excluded.att_value
            "#,
            params![consent_id, key, value],
        )?;
    }
    Ok(())
}

pub(crate) fn get_attributes_impl(
    conn: &Connection,
    consent_id: &str,
) -> Result<HashMap<String, String>, ConsentError> {
    let mut stmt =
        conn.prepare("SELECT att_key, att_value FROM consent_attribute WHERE consent_id = ?1")?;
    let rows = stmt.query_map([consent_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = HashMap::new();
    for r in rows {
        let (key, value) = r?;
        out.insert(key, value);
    }
    Ok(out)
}

pub(crate) fn get_attributes_by_keys_impl(
    conn: &Connection,
    consent_id: &str,
    keys: &[String],
) -> Result<HashMap<String, String>, ConsentError> {
    let mut out = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT att_value FROM consent_attribute WHERE consent_id = ?1 AND att_key = ?2",
    )?;
    for key in keys {
        let value: Option<String> = stmt
            .query_row(params![consent_id, key], |row| row.get(0))
            .optional()?;
        if let Some(value) = value {
            out.insert(key.clone(), value);
        }
    }
    Ok(out)
}

pub(crate) fn delete_attributes_impl(
    conn: &Connection,
    consent_id: &str,
    keys: &[String],
) -> Result<usize, ConsentError> {
    let mut deleted = 0;
    for key in keys {
        deleted += conn.execute(
            "DELETE FROM consent_attribute WHERE consent_id = ?1 AND att_key = ?2",
            params![consent_id, key],
        )?;
    }
    Ok(deleted)
}
