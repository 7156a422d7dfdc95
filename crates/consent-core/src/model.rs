//! Entities of the consent lifecycle engine.
//!
//! Status and type tags are plain strings: the tag sets are
//! deployment-configurable (see `ServiceConfig`), the transition graph is
//! caller policy. Timestamps are `DateTime<Utc>` in the model and epoch
//! seconds in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default consent status tags.
pub mod status {
    pub const RECEIVED: &str = "received";
    pub const AWAITING_AUTHORIZATION: &str = "awaitingAuthorization";
    pub const AUTHORIZED: &str = "authorized";
    pub const ACTIVE: &str = "active";
    pub const REJECTED: &str = "rejected";
    pub const REVOKED: &str = "revoked";
    pub const EXPIRED: &str = "expired";
}

/// Default authorization status tags.
pub mod auth_status {
    pub const CREATED: &str = "created";
    pub const AUTHORIZED: &str = "authorized";
    pub const REJECTED: &str = "rejected";
    pub const REVOKED: &str = "revoked";
}

/// Default mapping status tags.
pub mod mapping_status {
    pub const ACTIVE: &str = "active";
    pub const INACTIVE: &str = "inactive";
}

/// The grant itself. Aggregate root of authorizations, mappings and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentResource {
    pub consent_id: String,
    pub org_id: String,
    pub client_id: String,
    /// Opaque serialized grant payload.
    pub receipt: String,
    pub consent_type: String,
    pub current_status: String,
    /// How many times the grant may be exercised. 0 = unlimited.
    pub consent_frequency: u32,
    /// Validity window in seconds from `created_time`. 0 = no expiry.
    pub validity_period: i64,
    pub recurring_indicator: bool,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
}

impl ConsentResource {
    /// Absolute expiry, if the consent carries a validity window.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.validity_period > 0 {
            Some(self.created_time + chrono::Duration::seconds(self.validity_period))
        } else {
            None
        }
    }
}

/// One user approval episode against a consent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResource {
    pub auth_id: String,
    pub consent_id: String,
    /// Unknown until the approval step binds a user.
    pub user_id: Option<String>,
    pub auth_status: String,
    pub auth_type: String,
    pub updated_time: DateTime<Utc>,
}

/// Binding of an authorization to one concrete resource with a permission.
/// Independently revocable per mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentMappingResource {
    pub mapping_id: String,
    pub auth_id: String,
    pub account_id: String,
    pub permission: String,
    pub mapping_status: String,
}

/// Append-only record of one status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentStatusAuditRecord {
    pub status_audit_id: String,
    pub consent_id: String,
    pub current_status: String,
    /// None for the creation record.
    pub previous_status: Option<String>,
    pub action_time: DateTime<Utc>,
    pub action_by: Option<String>,
    pub reason: Option<String>,
}

/// Read-only composite: a consent plus its children. Assembled on read,
/// never persisted as such.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedConsentResource {
    pub consent: ConsentResource,
    pub authorizations: Vec<AuthorizationResource>,
    pub mappings: Vec<ConsentMappingResource>,
    pub attributes: HashMap<String, String>,
}

/// Immutable snapshot of a consent's detailed state captured before an
/// amendment, persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentHistoryResource {
    pub history_id: String,
    pub consent_id: String,
    pub amended_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub detailed_consent: DetailedConsentResource,
    /// `sha256:<hex>` over the canonical snapshot JSON.
    pub snapshot_digest: String,
}

/// Input for consent creation. Attributes ride along and are inserted in
/// the same transaction.
#[derive(Debug, Clone)]
pub struct NewConsent {
    pub org_id: String,
    pub client_id: String,
    pub receipt: String,
    pub consent_type: String,
    pub current_status: String,
    pub consent_frequency: u32,
    pub validity_period: i64,
    pub recurring_indicator: bool,
    pub attributes: HashMap<String, String>,
}

/// Input for authorization creation. The owning consent id is supplied by
/// the operation, not the payload.
#[derive(Debug, Clone)]
pub struct NewAuthorization {
    pub user_id: Option<String>,
    pub auth_status: String,
    pub auth_type: String,
}

/// Full-replace payload for authorization update. No partial-field merge.
#[derive(Debug, Clone)]
pub struct AuthorizationUpdate {
    pub user_id: Option<String>,
    pub auth_status: String,
    pub auth_type: String,
}

/// Input for mapping creation under an authorization.
#[derive(Debug, Clone)]
pub struct NewConsentMapping {
    pub account_id: String,
    pub permission: String,
    pub mapping_status: String,
}

/// One status transition applied to every consent matching the filter.
#[derive(Debug, Clone)]
pub struct BulkStatusUpdate {
    pub org_id: String,
    pub client_id: String,
    pub consent_type: String,
    pub new_status: String,
    /// Only consents whose current status is in this set are touched.
    pub applicable_statuses: Vec<String>,
    pub user_id: Option<String>,
    pub reason: Option<String>,
}

/// Multi-criteria consent search. Absent dimensions impose no constraint.
#[derive(Debug, Clone)]
pub struct ConsentSearchFilter {
    pub org_id: String,
    pub consent_ids: Vec<String>,
    pub client_ids: Vec<String>,
    pub consent_types: Vec<String>,
    pub consent_statuses: Vec<String>,
    pub user_ids: Vec<String>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ConsentSearchFilter {
    /// Unconstrained filter for one organization.
    pub fn for_org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            consent_ids: Vec::new(),
            client_ids: Vec::new(),
            consent_types: Vec::new(),
            consent_statuses: Vec::new(),
            user_ids: Vec::new(),
            from_time: None,
            to_time: None,
            limit: None,
            offset: None,
        }
    }
}

/// Audit-trail search. Every dimension optional; all compose as AND.
#[derive(Debug, Clone, Default)]
pub struct AuditSearchFilter {
    pub consent_id: Option<String>,
    pub status: Option<String>,
    pub action_by: Option<String>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub status_audit_id: Option<String>,
}

/// Pre-amendment snapshot handed to the history write.
#[derive(Debug, Clone)]
pub struct AmendmentCandidate {
    pub amended_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub detailed_consent: DetailedConsentResource,
}
