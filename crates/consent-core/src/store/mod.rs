//! ConsentStore: SQLite-backed persistence facade for the consent engine.
//!
//! Owns the six tables (consent, authorization, consent_mapping,
//! consent_attribute, consent_status_audit, consent_amendment_history) and
//! provides atomic multi-row operations. Every mutating composite runs
//! inside one `BEGIN IMMEDIATE` transaction; either all rows for a logical
//! operation land, or none do.

use crate::errors::ConsentError;
use crate::model::{
    AuditSearchFilter, AuthorizationResource, AuthorizationUpdate, BulkStatusUpdate,
    ConsentHistoryResource, ConsentMappingResource, ConsentResource, ConsentSearchFilter,
    ConsentStatusAuditRecord, DetailedConsentResource,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

pub(crate) mod rows;
pub mod schema;
mod store_internal;

pub use schema::CONSENT_SCHEMA;

use store_internal::{attributes, audit, authorization, consent, history, mapping, search};

/// Parameters for the revocation cascade.
#[derive(Debug, Clone)]
pub struct RevocationParams<'a> {
    pub consent_id: &'a str,
    pub org_id: &'a str,
    /// Terminal status written to the consent row.
    pub consent_status: &'a str,
    /// Status written to each non-terminal child authorization.
    pub auth_status: &'a str,
    /// Status written to each child mapping not already carrying it.
    pub mapping_status: &'a str,
    /// Child authorizations already in one of these are left untouched.
    pub terminal_statuses: &'a [String],
    pub action_by: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub now: DateTime<Utc>,
}

/// SQLite-backed consent store.
#[derive(Clone)]
pub struct ConsentStore {
    pub conn: Arc<Mutex<Connection>>,
}

impl ConsentStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, ConsentError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, ConsentError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a store from an existing connection (for multi-connection tests).
    pub fn from_connection(conn: Connection) -> Result<Self, ConsentError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), ConsentError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        let _ = conn.execute("PRAGMA busy_timeout = 5000", []);
        conn.execute_batch(CONSENT_SCHEMA)?;
        Ok(())
    }

    // =========================================================================
    // Consent creation and detailed reads
    // =========================================================================

    /// Inserts the consent, its attributes, any supplied authorizations and
    /// the initial audit record (previous status = none) atomically.
    /// Returns the audit record written.
    pub fn create_consent_detailed(
        &self,
        consent_row: &ConsentResource,
        auths: &[AuthorizationResource],
        attrs: &HashMap<String, String>,
        action_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<ConsentStatusAuditRecord, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            consent::insert_consent_impl(conn, consent_row)?;
            attributes::upsert_attributes_impl(conn, &consent_row.consent_id, attrs)?;
            for auth in auths {
                authorization::insert_authorization_impl(conn, auth)?;
            }
            let record = new_audit_record(
                &consent_row.consent_id,
                &consent_row.current_status,
                None,
                consent_row.created_time,
                action_by,
                reason,
            );
            audit::insert_audit_impl(conn, &record)?;
            Ok(record)
        })
    }

    /// Read-consistent composite view of one consent. NotFound when the
    /// consent does not exist or belongs to a different organization.
    pub fn get_detailed_consent(
        &self,
        consent_id: &str,
        org_id: &str,
    ) -> Result<DetailedConsentResource, ConsentError> {
        let conn = self.conn.lock().unwrap();
        read_txn(&conn, |conn| {
            search::assemble_detail_impl(conn, consent_id, org_id)?
                .ok_or_else(|| ConsentError::not_found("consent", consent_id))
        })
    }

    pub fn get_consent(
        &self,
        consent_id: &str,
        org_id: &str,
    ) -> Result<ConsentResource, ConsentError> {
        let conn = self.conn.lock().unwrap();
        consent::get_consent_impl(&conn, consent_id, org_id)?
            .ok_or_else(|| ConsentError::not_found("consent", consent_id))
    }

    // =========================================================================
    // Authorizations and mappings
    // =========================================================================

    /// Inserts one authorization. NotFound when the owning consent is absent.
    pub fn insert_authorization(
        &self,
        auth: &AuthorizationResource,
    ) -> Result<(), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            if !consent::consent_exists_impl(conn, &auth.consent_id)? {
                return Err(ConsentError::not_found("consent", &auth.consent_id));
            }
            authorization::insert_authorization_impl(conn, auth)
        })
    }

    pub fn get_authorization(
        &self,
        auth_id: &str,
        org_id: &str,
    ) -> Result<AuthorizationResource, ConsentError> {
        let conn = self.conn.lock().unwrap();
        authorization::get_authorization_impl(&conn, auth_id, org_id)?
            .ok_or_else(|| ConsentError::not_found("authorization", auth_id))
    }

    /// Full-resource replace. Returns the updated row.
    pub fn update_authorization(
        &self,
        auth_id: &str,
        org_id: &str,
        update: &AuthorizationUpdate,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationResource, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            if authorization::get_authorization_impl(conn, auth_id, org_id)?.is_none() {
                return Err(ConsentError::not_found("authorization", auth_id));
            }
            authorization::update_authorization_impl(conn, auth_id, update, now)?;
            authorization::get_authorization_impl(conn, auth_id, org_id)?
                .ok_or_else(|| ConsentError::not_found("authorization", auth_id))
        })
    }

    /// Deletes one authorization and its mappings. NotFound when no such
    /// row exists; "nothing to delete" is never a silent success.
    pub fn delete_authorization(&self, auth_id: &str) -> Result<(), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            if authorization::delete_authorization_impl(conn, auth_id)? {
                Ok(())
            } else {
                Err(ConsentError::not_found("authorization", auth_id))
            }
        })
    }

    /// Inserts mappings under one authorization. NotFound when the
    /// authorization is absent.
    pub fn insert_mappings(
        &self,
        auth_id: &str,
        mappings: &[ConsentMappingResource],
    ) -> Result<(), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM authorization WHERE auth_id = ?1",
                [auth_id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(ConsentError::not_found("authorization", auth_id));
            }
            for m in mappings {
                mapping::insert_mapping_impl(conn, m)?;
            }
            Ok(())
        })
    }

    /// Mappings under one authorization. NotFound when the authorization
    /// is absent.
    pub fn get_mappings_for_authorization(
        &self,
        auth_id: &str,
    ) -> Result<Vec<ConsentMappingResource>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM authorization WHERE auth_id = ?1",
            [auth_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(ConsentError::not_found("authorization", auth_id));
        }
        mapping::list_mappings_for_auth_impl(&conn, auth_id)
    }

    /// Moves the given mappings to `new_status`. NotFound when any id is
    /// absent; the whole update rolls back in that case.
    pub fn update_mapping_status(
        &self,
        mapping_ids: &[String],
        new_status: &str,
    ) -> Result<(), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            for mapping_id in mapping_ids {
                let changed =
                    mapping::update_mapping_status_impl(conn, std::slice::from_ref(mapping_id), new_status)?;
                if changed == 0 {
                    return Err(ConsentError::not_found("consent mapping", mapping_id));
                }
            }
            Ok(())
        })
    }

    // =========================================================================
    // Status transitions and audit
    // =========================================================================

    /// Transitions the consent status and appends one audit record in the
    /// same transaction. The previous status recorded is read from the row
    /// being updated, inside the write transaction, so concurrent
    /// transitions can never record a stale value.
    pub fn update_status_with_audit(
        &self,
        consent_id: &str,
        org_id: &str,
        new_status: &str,
        action_by: Option<&str>,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(ConsentResource, ConsentStatusAuditRecord), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            let previous = consent::read_status_for_update_impl(conn, consent_id, org_id)?
                .ok_or_else(|| ConsentError::not_found("consent", consent_id))?;
            consent::update_status_impl(conn, consent_id, new_status, now)?;
            let record = new_audit_record(
                consent_id,
                new_status,
                Some(previous),
                now,
                action_by,
                reason,
            );
            audit::insert_audit_impl(conn, &record)?;
            let updated = consent::get_consent_impl(conn, consent_id, org_id)?
                .ok_or_else(|| ConsentError::not_found("consent", consent_id))?;
            Ok((updated, record))
        })
    }

    /// Applies one transition to every consent matching the filter, one
    /// audit record per affected consent. Runs as a single transaction;
    /// a matched-row count above `max_rows` aborts with Conflict before
    /// any write, and a deadline hit mid-loop rolls everything back.
    pub fn bulk_update_status(
        &self,
        update: &BulkStatusUpdate,
        now: DateTime<Utc>,
        deadline: Option<Instant>,
        max_rows: usize,
    ) -> Result<Vec<String>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            let candidates = consent::select_bulk_candidates_impl(conn, update)?;
            if candidates.len() > max_rows {
                return Err(ConsentError::conflict(format!(
                    "bulk update matches {} consents, above the configured ceiling of {max_rows}",
                    candidates.len()
                )));
            }
            let mut affected = Vec::with_capacity(candidates.len());
            for (consent_id, previous) in candidates {
                if deadline_exceeded(deadline) {
                    return Err(ConsentError::storage(
                        "deadline exceeded during bulk status update",
                    ));
                }
                consent::update_status_impl(conn, &consent_id, &update.new_status, now)?;
                let record = new_audit_record(
                    &consent_id,
                    &update.new_status,
                    Some(previous),
                    now,
                    update.user_id.as_deref(),
                    update.reason.as_deref(),
                );
                audit::insert_audit_impl(conn, &record)?;
                affected.push(consent_id);
            }
            Ok(affected)
        })
    }

    /// Terminal transition plus cascade: every non-terminal child
    /// authorization and every child mapping not already in the target
    /// status move with the consent, in one transaction.
    pub fn revoke_cascade(&self, params: &RevocationParams<'_>) -> Result<bool, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            let previous =
                consent::read_status_for_update_impl(conn, params.consent_id, params.org_id)?
                    .ok_or_else(|| ConsentError::not_found("consent", params.consent_id))?;
            consent::update_status_impl(conn, params.consent_id, params.consent_status, params.now)?;
            let record = new_audit_record(
                params.consent_id,
                params.consent_status,
                Some(previous),
                params.now,
                params.action_by,
                params.reason,
            );
            audit::insert_audit_impl(conn, &record)?;
            authorization::revoke_authorizations_impl(
                conn,
                params.consent_id,
                params.auth_status,
                params.terminal_statuses,
                params.now,
            )?;
            mapping::revoke_mappings_impl(conn, params.consent_id, params.mapping_status)?;
            Ok(true)
        })
    }

    /// Moves every matured, non-terminal consent of the organization to
    /// `expired_status`, one audit record each, in one transaction.
    pub fn expire_overdue(
        &self,
        org_id: &str,
        expired_status: &str,
        terminal_statuses: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            let candidates =
                consent::select_expiry_candidates_impl(conn, org_id, now, terminal_statuses)?;
            let mut affected = Vec::with_capacity(candidates.len());
            for (consent_id, previous) in candidates {
                consent::update_status_impl(conn, &consent_id, expired_status, now)?;
                let record = new_audit_record(
                    &consent_id,
                    expired_status,
                    Some(previous),
                    now,
                    None,
                    Some("validity period elapsed"),
                );
                audit::insert_audit_impl(conn, &record)?;
                affected.push(consent_id);
            }
            Ok(affected)
        })
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Cascade-deletes the consent and its operational children. Audit and
    /// amendment-history rows are retained. NotFound when the consent is
    /// absent.
    pub fn delete_consent(&self, consent_id: &str) -> Result<bool, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            if consent::delete_consent_rows_impl(conn, consent_id)? {
                Ok(true)
            } else {
                Err(ConsentError::not_found("consent", consent_id))
            }
        })
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Upserts the supplied keys. NotFound when the consent is absent.
    pub fn upsert_attributes(
        &self,
        consent_id: &str,
        attrs: &HashMap<String, String>,
    ) -> Result<(), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            if !consent::consent_exists_impl(conn, consent_id)? {
                return Err(ConsentError::not_found("consent", consent_id));
            }
            attributes::upsert_attributes_impl(conn, consent_id, attrs)
        })
    }

    pub fn get_attributes(
        &self,
        consent_id: &str,
    ) -> Result<HashMap<String, String>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        if !consent::consent_exists_impl(&conn, consent_id)? {
            return Err(ConsentError::not_found("consent", consent_id));
        }
        attributes::get_attributes_impl(&conn, consent_id)
    }

    pub fn get_attributes_by_keys(
        &self,
        consent_id: &str,
        keys: &[String],
    ) -> Result<HashMap<String, String>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        if !consent::consent_exists_impl(&conn, consent_id)? {
            return Err(ConsentError::not_found("consent", consent_id));
        }
        attributes::get_attributes_by_keys_impl(&conn, consent_id, keys)
    }

    /// Deletes the supplied keys. Returns the number of rows removed.
    pub fn delete_attributes(
        &self,
        consent_id: &str,
        keys: &[String],
    ) -> Result<usize, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            if !consent::consent_exists_impl(conn, consent_id)? {
                return Err(ConsentError::not_found("consent", consent_id));
            }
            attributes::delete_attributes_impl(conn, consent_id, keys)
        })
    }

    // =========================================================================
    // Audit reads
    // =========================================================================

    pub fn search_audit_records(
        &self,
        filter: &AuditSearchFilter,
    ) -> Result<Vec<ConsentStatusAuditRecord>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        audit::search_audit_impl(&conn, filter)
    }

    pub fn get_audit_records(
        &self,
        consent_ids: &[String],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConsentStatusAuditRecord>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        audit::page_audit_impl(&conn, consent_ids, limit, offset)
    }

    // =========================================================================
    // Amendment history
    // =========================================================================

    pub fn insert_amendment_history(
        &self,
        history: &ConsentHistoryResource,
    ) -> Result<(), ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| history::insert_history_impl(conn, history))
    }

    /// Snapshots for one consent, most recent amendment first.
    pub fn get_amendment_history(
        &self,
        consent_id: &str,
    ) -> Result<Vec<ConsentHistoryResource>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        history::list_history_impl(&conn, consent_id)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Multi-criteria search assembling each match into its detailed view.
    /// The page and the per-consent assembly run inside one read
    /// transaction; the deadline is checked between rows.
    pub fn search_detailed_consents(
        &self,
        filter: &ConsentSearchFilter,
        or_chain_threshold: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<DetailedConsentResource>, ConsentError> {
        let conn = self.conn.lock().unwrap();
        read_txn(&conn, |conn| {
            let ids = search::search_consent_ids_impl(conn, filter, or_chain_threshold)?;
            let mut out = Vec::with_capacity(ids.len());
            for consent_id in ids {
                if deadline_exceeded(deadline) {
                    return Err(ConsentError::storage(
                        "deadline exceeded during consent search",
                    ));
                }
                if let Some(detail) =
                    search::assemble_detail_impl(conn, &consent_id, &filter.org_id)?
                {
                    out.push(detail);
                }
            }
            Ok(out)
        })
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    pub fn update_expiry(
        &self,
        consent_id: &str,
        org_id: &str,
        validity_period: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, ConsentError> {
        let conn = self.conn.lock().unwrap();
        write_txn(&conn, |conn| {
            let changed =
                consent::update_validity_impl(conn, consent_id, org_id, validity_period, now)?;
            if changed == 0 {
                return Err(ConsentError::not_found("consent", consent_id));
            }
            Ok(true)
        })
    }

    // =========================================================================
    // Counters (for tests/diagnostics)
    // =========================================================================

    pub fn count_consents(&self, org_id: &str) -> Result<u64, ConsentError> {
        let conn = self.conn.lock().unwrap();
        consent::count_consents_impl(&conn, org_id)
    }

    pub fn count_audit_records(&self, consent_id: &str) -> Result<u64, ConsentError> {
        let conn = self.conn.lock().unwrap();
        audit::count_audit_impl(&conn, consent_id)
    }

    pub fn count_history_records(&self, consent_id: &str) -> Result<u64, ConsentError> {
        let conn = self.conn.lock().unwrap();
        history::count_history_impl(&conn, consent_id)
    }
}

fn new_audit_record(
    consent_id: &str,
    current_status: &str,
    previous_status: Option<String>,
    action_time: DateTime<Utc>,
    action_by: Option<&str>,
    reason: Option<&str>,
) -> ConsentStatusAuditRecord {
    ConsentStatusAuditRecord {
        status_audit_id: Uuid::new_v4().to_string(),
        consent_id: consent_id.to_string(),
        current_status: current_status.to_string(),
        previous_status,
        action_time,
        action_by: action_by.map(str::to_string),
        reason: reason.map(str::to_string),
    }
}

/// BEGIN IMMEDIATE acquires the write lock up front; the closure's row
/// reads therefore observe the state no concurrent writer can change
/// before commit.
fn write_txn<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, ConsentError>,
) -> Result<T, ConsentError> {
    conn.execute("BEGIN IMMEDIATE", [])?;
    let result = f(conn);
    match &result {
        Ok(_) => {
            conn.execute("COMMIT", [])?;
        }
        Err(_) => {
            let _ = conn.execute("ROLLBACK", []);
        }
    }
    result
}

/// Deferred transaction for multi-statement reads: a single read never
/// mixes two concurrent writers' partial states.
fn read_txn<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, ConsentError>,
) -> Result<T, ConsentError> {
    conn.execute("BEGIN", [])?;
    let result = f(conn);
    match &result {
        Ok(_) => {
            conn.execute("COMMIT", [])?;
        }
        Err(_) => {
            let _ = conn.execute("ROLLBACK", []);
        }
    }
    result
}

fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
