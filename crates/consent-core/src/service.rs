//! Consent lifecycle service: the public API of the engine.
//!
//! Orchestrates the store, audit trail, amendment history and search into
//! the operations callers consume. Every mutating operation validates its
//! arguments, then delegates to one atomic store transaction. Collaborators
//! arrive through the constructor; there is no global state.
//!
//! The engine does not hard-code a status transition graph. It guarantees
//! that every transition is atomic with its audit record, survives
//! concurrent writers, and records the actual previous status.

use crate::errors::ConsentError;
use crate::model::{
    status, AmendmentCandidate, AuditSearchFilter, AuthorizationResource, AuthorizationUpdate,
    BulkStatusUpdate, ConsentHistoryResource, ConsentMappingResource, ConsentResource,
    ConsentSearchFilter, ConsentStatusAuditRecord, DetailedConsentResource, NewAuthorization,
    NewConsent, NewConsentMapping,
};
use crate::search::DEFAULT_OR_CHAIN_THRESHOLD;
use crate::store::{ConsentStore, RevocationParams};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

#[path = "service_internal/mod.rs"]
mod service_internal;

use service_internal::build;
use service_internal::validate::{
    require_known_status, require_non_blank, require_non_empty_list, require_non_empty_map,
};

/// Deployment-level configuration. Tag sets are closed but configurable;
/// the transition graph between them is caller policy.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Closed set of consent status tags accepted by status transitions.
    pub status_tags: Vec<String>,
    /// Statuses treated as terminal by revocation and expiry.
    pub terminal_statuses: Vec<String>,
    pub revoked_status: String,
    pub revoked_auth_status: String,
    pub revoked_mapping_status: String,
    pub expired_status: String,
    /// Matched-row ceiling for a bulk status update, which runs as one
    /// transaction. Matching more rows than this fails with Conflict
    /// before any write.
    pub bulk_update_max_rows: usize,
    /// Membership lists longer than this are OR-chained in search SQL.
    pub or_chain_threshold: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            status_tags: [
                status::RECEIVED,
                status::AWAITING_AUTHORIZATION,
                status::AUTHORIZED,
                status::ACTIVE,
                status::REJECTED,
                status::REVOKED,
                status::EXPIRED,
            ]
            .map(str::to_string)
            .to_vec(),
            terminal_statuses: [status::REJECTED, status::REVOKED, status::EXPIRED]
                .map(str::to_string)
                .to_vec(),
            revoked_status: status::REVOKED.to_string(),
            revoked_auth_status: crate::model::auth_status::REVOKED.to_string(),
            revoked_mapping_status: crate::model::mapping_status::INACTIVE.to_string(),
            expired_status: status::EXPIRED.to_string(),
            bulk_update_max_rows: 10_000,
            or_chain_threshold: DEFAULT_OR_CHAIN_THRESHOLD,
        }
    }
}

/// The consent lifecycle service.
#[derive(Clone)]
pub struct ConsentService {
    store: ConsentStore,
    config: ServiceConfig,
}

impl ConsentService {
    pub fn new(store: ConsentStore) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: ConsentStore, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // =========================================================================
    // Creation and detailed reads
    // =========================================================================

    /// Creates a consent with its attributes, any supplied authorizations
    /// and the initial audit record, in one transaction. Returns the fully
    /// assembled detailed resource including generated ids.
    pub fn create_consent(
        &self,
        new: &NewConsent,
        authorizations: &[NewAuthorization],
    ) -> Result<DetailedConsentResource, ConsentError> {
        require_non_blank("org id", &new.org_id)?;
        require_non_blank("client id", &new.client_id)?;
        require_non_blank("receipt", &new.receipt)?;
        require_non_blank("consent type", &new.consent_type)?;
        require_known_status(&self.config.status_tags, &new.current_status)?;
        for auth in authorizations {
            require_non_blank("authorization status", &auth.auth_status)?;
            require_non_blank("authorization type", &auth.auth_type)?;
        }

        let now = Utc::now();
        let consent_row = build::build_consent_row(new, now);
        let auth_rows: Vec<AuthorizationResource> = authorizations
            .iter()
            .map(|a| build::build_authorization_row(&consent_row.consent_id, a, now))
            .collect();

        self.store.create_consent_detailed(
            &consent_row,
            &auth_rows,
            &new.attributes,
            None,
            None,
        )?;
        info!(
            consent_id = %consent_row.consent_id,
            org_id = %new.org_id,
            consent_type = %new.consent_type,
            "consent created"
        );
        self.store
            .get_detailed_consent(&consent_row.consent_id, &new.org_id)
    }

    /// Read-consistent composite view. NotFound when the consent does not
    /// exist or belongs to a different organization.
    pub fn get_detailed_consent(
        &self,
        consent_id: &str,
        org_id: &str,
    ) -> Result<DetailedConsentResource, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_blank("org id", org_id)?;
        self.store.get_detailed_consent(consent_id, org_id)
    }

    // =========================================================================
    // Authorizations and mappings
    // =========================================================================

    /// Creates one authorization under an existing consent.
    pub fn create_consent_authorization(
        &self,
        consent_id: &str,
        new: &NewAuthorization,
    ) -> Result<AuthorizationResource, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_blank("authorization status", &new.auth_status)?;
        require_non_blank("authorization type", &new.auth_type)?;

        let auth = build::build_authorization_row(consent_id, new, Utc::now());
        self.store.insert_authorization(&auth)?;
        debug!(auth_id = %auth.auth_id, consent_id, "authorization created");
        Ok(auth)
    }

    pub fn get_authorization_resource(
        &self,
        auth_id: &str,
        org_id: &str,
    ) -> Result<AuthorizationResource, ConsentError> {
        require_non_blank("authorization id", auth_id)?;
        require_non_blank("org id", org_id)?;
        self.store.get_authorization(auth_id, org_id)
    }

    /// Replaces the full resource. No partial-field merge semantics.
    pub fn update_authorization_resource(
        &self,
        auth_id: &str,
        update: &AuthorizationUpdate,
        org_id: &str,
    ) -> Result<AuthorizationResource, ConsentError> {
        require_non_blank("authorization id", auth_id)?;
        require_non_blank("org id", org_id)?;
        require_non_blank("authorization status", &update.auth_status)?;
        require_non_blank("authorization type", &update.auth_type)?;
        let updated = self
            .store
            .update_authorization(auth_id, org_id, update, Utc::now())?;
        debug!(auth_id, "authorization updated");
        Ok(updated)
    }

    /// Deletes one authorization. A missing row is NotFound, never a
    /// silent no-op.
    pub fn delete_authorization_resource(&self, auth_id: &str) -> Result<(), ConsentError> {
        require_non_blank("authorization id", auth_id)?;
        self.store.delete_authorization(auth_id)?;
        debug!(auth_id, "authorization deleted");
        Ok(())
    }

    /// Creates mappings under an existing authorization.
    pub fn create_consent_mappings(
        &self,
        auth_id: &str,
        mappings: &[NewConsentMapping],
    ) -> Result<Vec<ConsentMappingResource>, ConsentError> {
        require_non_blank("authorization id", auth_id)?;
        require_non_empty_list("mappings", mappings.len())?;
        for m in mappings {
            require_non_blank("account id", &m.account_id)?;
            require_non_blank("permission", &m.permission)?;
            require_non_blank("mapping status", &m.mapping_status)?;
        }
        let rows = build::build_mapping_rows(auth_id, mappings);
        self.store.insert_mappings(auth_id, &rows)?;
        debug!(auth_id, count = rows.len(), "mappings created");
        Ok(rows)
    }

    /// Mappings under one authorization.
    pub fn get_consent_mappings(
        &self,
        auth_id: &str,
    ) -> Result<Vec<ConsentMappingResource>, ConsentError> {
        require_non_blank("authorization id", auth_id)?;
        self.store.get_mappings_for_authorization(auth_id)
    }

    /// Moves the given mappings to `new_status`. Mapping status is
    /// independent of the parent authorization's status.
    pub fn update_consent_mapping_status(
        &self,
        mapping_ids: &[String],
        new_status: &str,
    ) -> Result<(), ConsentError> {
        require_non_empty_list("mapping ids", mapping_ids.len())?;
        require_non_blank("mapping status", new_status)?;
        self.store.update_mapping_status(mapping_ids, new_status)?;
        debug!(count = mapping_ids.len(), new_status, "mapping status updated");
        Ok(())
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    /// Transitions the consent status and appends one audit record in the
    /// same transaction. The previous status in the audit record is the
    /// value read from the row inside that transaction, never a
    /// caller-supplied guess.
    pub fn update_consent_status(
        &self,
        consent_id: &str,
        new_status: &str,
        user_id: Option<&str>,
        reason: Option<&str>,
        org_id: &str,
    ) -> Result<ConsentResource, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_blank("org id", org_id)?;
        require_known_status(&self.config.status_tags, new_status)?;

        let (updated, record) = self.store.update_status_with_audit(
            consent_id,
            org_id,
            new_status,
            user_id,
            reason,
            Utc::now(),
        )?;
        info!(
            consent_id,
            new_status,
            previous_status = record.previous_status.as_deref().unwrap_or("none"),
            "consent status updated"
        );
        Ok(updated)
    }

    /// Applies one transition to every consent matching the filter, one
    /// audit record per affected consent, as a single transaction with a
    /// configured matched-row ceiling. Returns the affected consent ids.
    pub fn bulk_update_consent_status(
        &self,
        update: &BulkStatusUpdate,
        deadline: Option<Instant>,
    ) -> Result<Vec<String>, ConsentError> {
        require_non_blank("org id", &update.org_id)?;
        require_non_blank("client id", &update.client_id)?;
        require_non_blank("consent type", &update.consent_type)?;
        require_known_status(&self.config.status_tags, &update.new_status)?;
        require_non_empty_list("applicable statuses", update.applicable_statuses.len())?;

        let affected = self.store.bulk_update_status(
            update,
            Utc::now(),
            deadline,
            self.config.bulk_update_max_rows,
        )?;
        info!(
            org_id = %update.org_id,
            client_id = %update.client_id,
            new_status = %update.new_status,
            affected = affected.len(),
            "bulk consent status update"
        );
        Ok(affected)
    }

    /// Deletes the consent and its operational children. Audit and
    /// amendment-history rows are retained.
    pub fn delete_consent(&self, consent_id: &str) -> Result<bool, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        let deleted = self.store.delete_consent(consent_id)?;
        info!(consent_id, "consent deleted");
        Ok(deleted)
    }

    /// Transitions the consent to the configured terminal revoked status
    /// and revokes all non-terminal child authorizations and mappings in
    /// the same transaction. Conflict when the consent is already terminal.
    pub fn revoke_consent(
        &self,
        consent_id: &str,
        org_id: &str,
        action_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_blank("org id", org_id)?;

        let current = self.store.get_consent(consent_id, org_id)?;
        if self
            .config
            .terminal_statuses
            .iter()
            .any(|s| s == &current.current_status)
        {
            return Err(ConsentError::conflict(format!(
                "consent {consent_id} is already in terminal status {}",
                current.current_status
            )));
        }

        let revoked = self.store.revoke_cascade(&RevocationParams {
            consent_id,
            org_id,
            consent_status: &self.config.revoked_status,
            auth_status: &self.config.revoked_auth_status,
            mapping_status: &self.config.revoked_mapping_status,
            terminal_statuses: &self.config.terminal_statuses,
            action_by,
            reason,
            now: Utc::now(),
        })?;
        info!(consent_id, org_id, "consent revoked");
        Ok(revoked)
    }

    /// Moves every matured, non-terminal consent of the organization to
    /// the configured expired status. Returns the affected consent ids.
    pub fn expire_overdue_consents(
        &self,
        org_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ConsentError> {
        require_non_blank("org id", org_id)?;
        let affected = self.store.expire_overdue(
            org_id,
            &self.config.expired_status,
            &self.config.terminal_statuses,
            now,
        )?;
        if !affected.is_empty() {
            info!(org_id, expired = affected.len(), "overdue consents expired");
        }
        Ok(affected)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Stores attributes for a consent. At least one entry is required.
    pub fn store_consent_attributes(
        &self,
        consent_id: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<(), ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_empty_map("attributes", attributes)?;
        self.store.upsert_attributes(consent_id, attributes)?;
        debug!(consent_id, count = attributes.len(), "attributes stored");
        Ok(())
    }

    pub fn get_consent_attributes(
        &self,
        consent_id: &str,
    ) -> Result<HashMap<String, String>, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        self.store.get_attributes(consent_id)
    }

    pub fn get_consent_attributes_by_keys(
        &self,
        consent_id: &str,
        keys: &[String],
    ) -> Result<HashMap<String, String>, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_empty_list("attribute keys", keys.len())?;
        self.store.get_attributes_by_keys(consent_id, keys)
    }

    /// Upserts the supplied keys. Not a merge-then-diff: keys not supplied
    /// are left untouched.
    pub fn update_consent_attributes(
        &self,
        consent_id: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<(), ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_empty_map("attributes", attributes)?;
        self.store.upsert_attributes(consent_id, attributes)?;
        debug!(consent_id, count = attributes.len(), "attributes updated");
        Ok(())
    }

    /// Deletes the supplied keys. Returns the number of entries removed.
    pub fn delete_consent_attributes(
        &self,
        consent_id: &str,
        keys: &[String],
    ) -> Result<usize, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_empty_list("attribute keys", keys.len())?;
        let deleted = self.store.delete_attributes(consent_id, keys)?;
        debug!(consent_id, deleted, "attributes deleted");
        Ok(deleted)
    }

    // =========================================================================
    // Audit trail
    // =========================================================================

    /// Searches audit records. Every filter optional; absent filters
    /// impose no constraint.
    pub fn search_consent_status_audit_records(
        &self,
        filter: &AuditSearchFilter,
    ) -> Result<Vec<ConsentStatusAuditRecord>, ConsentError> {
        self.store.search_audit_records(filter)
    }

    /// Paginated audit read over an optional consent-id list. An empty
    /// list returns the unfiltered, paginated result.
    pub fn get_consent_status_audit_records(
        &self,
        consent_ids: &[String],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConsentStatusAuditRecord>, ConsentError> {
        self.store.get_audit_records(consent_ids, limit, offset)
    }

    // =========================================================================
    // Amendment history
    // =========================================================================

    /// Persists the pre-amendment snapshot verbatim, tagged with its
    /// amended timestamp. Must be called before (or within the same
    /// transaction as) the mutation that causes the amendment, so history
    /// never references a state that was never durably current. Returns
    /// the generated history id.
    pub fn store_consent_amendment_history(
        &self,
        consent_id: &str,
        candidate: &AmendmentCandidate,
        current_detailed_consent: &DetailedConsentResource,
    ) -> Result<String, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        if candidate.detailed_consent.consent.consent_id != consent_id {
            return Err(ConsentError::invalid_argument(
                "amendment snapshot does not belong to the given consent id",
            ));
        }
        if current_detailed_consent.consent.consent_id != consent_id {
            return Err(ConsentError::invalid_argument(
                "current detailed consent does not belong to the given consent id",
            ));
        }

        let history = build::build_history_row(consent_id, candidate)?;
        self.store.insert_amendment_history(&history)?;
        info!(
            consent_id,
            history_id = %history.history_id,
            amended_time = %history.amended_time,
            "amendment history stored"
        );
        Ok(history.history_id)
    }

    /// Snapshots for one consent, most recent amendment first.
    pub fn get_consent_amendment_history(
        &self,
        consent_id: &str,
    ) -> Result<Vec<ConsentHistoryResource>, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        self.store.get_amendment_history(consent_id)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Multi-criteria search returning detailed resources. Absent filter
    /// dimensions impose no constraint; all present dimensions compose
    /// with logical AND.
    pub fn search_detailed_consents(
        &self,
        filter: &ConsentSearchFilter,
        deadline: Option<Instant>,
    ) -> Result<Vec<DetailedConsentResource>, ConsentError> {
        require_non_blank("org id", &filter.org_id)?;
        self.store
            .search_detailed_consents(filter, self.config.or_chain_threshold, deadline)
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Sets the consent's expiry to the given absolute time by recomputing
    /// the validity window from the creation time.
    pub fn update_consent_expiry_time(
        &self,
        consent_id: &str,
        expires_at: DateTime<Utc>,
        org_id: &str,
    ) -> Result<bool, ConsentError> {
        require_non_blank("consent id", consent_id)?;
        require_non_blank("org id", org_id)?;

        let consent = self.store.get_consent(consent_id, org_id)?;
        let validity_period = (expires_at - consent.created_time).num_seconds();
        if validity_period <= 0 {
            return Err(ConsentError::invalid_argument(
                "expiry time must be after the consent's creation time",
            ));
        }
        let updated = self
            .store
            .update_expiry(consent_id, org_id, validity_period, Utc::now())?;
        debug!(consent_id, validity_period, "consent expiry updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::model::{auth_status, mapping_status};

    fn service() -> ConsentService {
        ConsentService::new(ConsentStore::memory().unwrap())
    }

    fn new_consent(org: &str) -> NewConsent {
        NewConsent {
            org_id: org.to_string(),
            client_id: "app-1".to_string(),
            receipt: r#"{"permissions":["ReadAccountsBasic"]}"#.to_string(),
            consent_type: "accounts".to_string(),
            current_status: status::RECEIVED.to_string(),
            consent_frequency: 1,
            validity_period: 0,
            recurring_indicator: false,
            attributes: HashMap::new(),
        }
    }

    fn new_auth(user: &str) -> NewAuthorization {
        NewAuthorization {
            user_id: Some(user.to_string()),
            auth_status: auth_status::CREATED.to_string(),
            auth_type: "authorization".to_string(),
        }
    }

    // === A) Creation ===

    #[test]
    fn test_create_consent_returns_assembled_detail_with_generated_ids() {
        let svc = service();
        let detail = svc
            .create_consent(&new_consent("org1"), &[new_auth("user@bank")])
            .unwrap();

        assert!(!detail.consent.consent_id.is_empty());
        assert_eq!(detail.authorizations.len(), 1);
        assert!(!detail.authorizations[0].auth_id.is_empty());
        assert_eq!(detail.authorizations[0].consent_id, detail.consent.consent_id);

        let records = svc
            .search_consent_status_audit_records(&AuditSearchFilter {
                consent_id: Some(detail.consent.consent_id.clone()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].previous_status, None);
    }

    #[test]
    fn test_create_consent_rejects_blank_mandatory_fields() {
        let svc = service();
        let mut blank_client = new_consent("org1");
        blank_client.client_id = "  ".to_string();
        assert_eq!(
            svc.create_consent(&blank_client, &[]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut blank_receipt = new_consent("org1");
        blank_receipt.receipt = String::new();
        assert_eq!(
            svc.create_consent(&blank_receipt, &[]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_create_consent_rejects_status_outside_the_closed_set() {
        let svc = service();
        let mut unknown = new_consent("org1");
        unknown.current_status = "frozen".to_string();
        assert_eq!(
            svc.create_consent(&unknown, &[]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    // === B) Status transitions ===

    #[test]
    fn test_update_consent_status_validates_the_tag() {
        let svc = service();
        let detail = svc.create_consent(&new_consent("org1"), &[]).unwrap();
        let err = svc
            .update_consent_status(&detail.consent.consent_id, "frozen", None, None, "org1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bulk_update_requires_applicable_statuses() {
        let svc = service();
        let err = svc
            .bulk_update_consent_status(
                &BulkStatusUpdate {
                    org_id: "org1".to_string(),
                    client_id: "app-1".to_string(),
                    consent_type: "accounts".to_string(),
                    new_status: status::EXPIRED.to_string(),
                    applicable_statuses: vec![],
                    user_id: None,
                    reason: None,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    // === C) Revocation ===

    #[test]
    fn test_revoke_consent_cascades_and_rejects_double_revocation() {
        let svc = service();
        let detail = svc
            .create_consent(&new_consent("org1"), &[new_auth("user@bank")])
            .unwrap();
        let consent_id = detail.consent.consent_id.clone();
        let auth_id = detail.authorizations[0].auth_id.clone();
        svc.create_consent_mappings(
            &auth_id,
            &[NewConsentMapping {
                account_id: "acc-001".to_string(),
                permission: "ReadAccountsBasic".to_string(),
                mapping_status: mapping_status::ACTIVE.to_string(),
            }],
        )
        .unwrap();

        assert!(svc
            .revoke_consent(&consent_id, "org1", Some("user@bank"), Some("user action"))
            .unwrap());

        let after = svc.get_detailed_consent(&consent_id, "org1").unwrap();
        assert_eq!(after.consent.current_status, status::REVOKED);
        assert_eq!(after.authorizations[0].auth_status, auth_status::REVOKED);
        assert_eq!(after.mappings[0].mapping_status, mapping_status::INACTIVE);

        let err = svc
            .revoke_consent(&consent_id, "org1", None, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    // === D) Attributes ===

    #[test]
    fn test_attribute_operations_require_non_empty_input() {
        let svc = service();
        let detail = svc.create_consent(&new_consent("org1"), &[]).unwrap();
        let consent_id = detail.consent.consent_id;

        assert_eq!(
            svc.store_consent_attributes(&consent_id, &HashMap::new())
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            svc.delete_consent_attributes(&consent_id, &[]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    // === E) Amendment history ===

    #[test]
    fn test_amendment_history_rejects_foreign_snapshots() {
        let svc = service();
        let detail = svc.create_consent(&new_consent("org1"), &[]).unwrap();
        let other = svc.create_consent(&new_consent("org1"), &[]).unwrap();

        let candidate = AmendmentCandidate {
            amended_time: Utc::now(),
            reason: None,
            detailed_consent: other.clone(),
        };
        let err = svc
            .store_consent_amendment_history(&detail.consent.consent_id, &candidate, &detail)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_amendment_history_stamps_a_content_digest() {
        let svc = service();
        let detail = svc.create_consent(&new_consent("org1"), &[]).unwrap();
        let consent_id = detail.consent.consent_id.clone();

        let history_id = svc
            .store_consent_amendment_history(
                &consent_id,
                &AmendmentCandidate {
                    amended_time: Utc::now(),
                    reason: Some("receipt amended".to_string()),
                    detailed_consent: detail.clone(),
                },
                &detail,
            )
            .unwrap();
        assert!(!history_id.is_empty());

        let history = svc.get_consent_amendment_history(&consent_id).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].snapshot_digest.starts_with("sha256:"));
        assert_eq!(history[0].detailed_consent, detail);
    }

    // === F) Expiry ===

    #[test]
    fn test_update_expiry_rejects_times_before_creation() {
        let svc = service();
        let detail = svc.create_consent(&new_consent("org1"), &[]).unwrap();
        let err = svc
            .update_consent_expiry_time(
                &detail.consent.consent_id,
                detail.consent.created_time - chrono::Duration::seconds(60),
                "org1",
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_expire_overdue_consents_uses_configured_tags() {
        let svc = service();
        let mut short_lived = new_consent("org1");
        short_lived.current_status = status::ACTIVE.to_string();
        short_lived.validity_period = 1;
        let detail = svc.create_consent(&short_lived, &[]).unwrap();

        let later = Utc::now() + chrono::Duration::seconds(60);
        let affected = svc.expire_overdue_consents("org1", later).unwrap();
        assert_eq!(affected, vec![detail.consent.consent_id.clone()]);
        assert_eq!(
            svc.get_detailed_consent(&detail.consent.consent_id, "org1")
                .unwrap()
                .consent
                .current_status,
            status::EXPIRED
        );
    }
}
