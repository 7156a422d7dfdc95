//! SQLite schema for the consent engine.
//!
//! Tables:
//! - `consent`: the grant itself (aggregate root)
//! - `authorization`: approval episodes, many per consent
//! - `consent_mapping`: account/permission bindings, many per authorization
//! - `consent_attribute`: key/value sidecar scoped to a consent
//! - `consent_status_audit`: append-only status transition log (no FK,
//!   rows outlive consent deletion)
//! - `consent_amendment_history`: immutable pre-amendment snapshots (no FK)

/// DDL for the consent engine tables.
///
/// Schema version: 1
pub const CONSENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS consent (
    consent_id          TEXT PRIMARY KEY,
    org_id              TEXT NOT NULL,
    client_id           TEXT NOT NULL,
    receipt             TEXT NOT NULL,
    consent_type        TEXT NOT NULL,
    current_status      TEXT NOT NULL,
    consent_frequency   INTEGER NOT NULL DEFAULT 0,
    validity_period     INTEGER NOT NULL DEFAULT 0,
    recurring_indicator INTEGER NOT NULL DEFAULT 0,
    created_time        INTEGER NOT NULL,
    updated_time        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS authorization (
    auth_id      TEXT PRIMARY KEY,
    consent_id   TEXT NOT NULL REFERENCES consent(consent_id),
    user_id      TEXT,
    auth_status  TEXT NOT NULL,
    auth_type    TEXT NOT NULL,
    updated_time INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS consent_mapping (
    mapping_id     TEXT PRIMARY KEY,
    auth_id        TEXT NOT NULL REFERENCES authorization(auth_id),
    account_id     TEXT NOT NULL,
    permission     TEXT NOT NULL,
    mapping_status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS consent_attribute (
    consent_id TEXT NOT NULL REFERENCES consent(consent_id),
    att_key    TEXT NOT NULL,
    att_value  TEXT NOT NULL,
    PRIMARY KEY (consent_id, att_key)
);

-- Evidentiary, append-only. No FK: rows are retained after consent deletion.
CREATE TABLE IF NOT EXISTS consent_status_audit (
    status_audit_id TEXT PRIMARY KEY,
    consent_id      TEXT NOT NULL,
    current_status  TEXT NOT NULL,
    previous_status TEXT,
    action_time     INTEGER NOT NULL,
    action_by       TEXT,
    reason          TEXT
);

-- Evidentiary, immutable snapshots. No FK: rows are retained after consent deletion.
CREATE TABLE IF NOT EXISTS consent_amendment_history (
    history_id      TEXT PRIMARY KEY,
    consent_id      TEXT NOT NULL,
    amended_time    INTEGER NOT NULL,
    reason          TEXT,
    snapshot_json   TEXT NOT NULL,
    snapshot_digest TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_consent_org_client
    ON consent(org_id, client_id);
CREATE INDEX IF NOT EXISTS idx_authorization_consent
    ON authorization(consent_id);
CREATE INDEX IF NOT EXISTS idx_mapping_auth
    ON consent_mapping(auth_id);
CREATE INDEX IF NOT EXISTS idx_audit_consent_time
    ON consent_status_audit(consent_id, action_time);
CREATE INDEX IF NOT EXISTS idx_history_consent_time
    ON consent_amendment_history(consent_id, amended_time);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CONSENT_SCHEMA).unwrap();
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CONSENT_SCHEMA).unwrap();
        conn.execute_batch(CONSENT_SCHEMA).unwrap();
    }

    #[test]
    fn test_schema_creates_all_six_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CONSENT_SCHEMA).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in [
            "consent",
            "authorization",
            "consent_mapping",
            "consent_attribute",
            "consent_status_audit",
            "consent_amendment_history",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }
}
