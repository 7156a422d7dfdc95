//! Row construction for service operations: generated ids, timestamps and
//! the content digest stamped on amendment-history snapshots.

use crate::errors::ConsentError;
use crate::model::{
    AmendmentCandidate, AuthorizationResource, ConsentHistoryResource, ConsentMappingResource,
    ConsentResource, NewAuthorization, NewConsent, NewConsentMapping,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub(crate) fn build_consent_row(new: &NewConsent, now: DateTime<Utc>) -> ConsentResource {
    ConsentResource {
        consent_id: Uuid::new_v4().to_string(),
        org_id: new.org_id.clone(),
        client_id: new.client_id.clone(),
        receipt: new.receipt.clone(),
        consent_type: new.consent_type.clone(),
        current_status: new.current_status.clone(),
        consent_frequency: new.consent_frequency,
        validity_period: new.validity_period,
        recurring_indicator: new.recurring_indicator,
        created_time: now,
        updated_time: now,
    }
}

pub(crate) fn build_authorization_row(
    consent_id: &str,
    new: &NewAuthorization,
    now: DateTime<Utc>,
) -> AuthorizationResource {
    AuthorizationResource {
        auth_id: Uuid::new_v4().to_string(),
        consent_id: consent_id.to_string(),
        user_id: new.user_id.clone(),
        auth_status: new.auth_status.clone(),
        auth_type: new.auth_type.clone(),
        updated_time: now,
    }
}

pub(crate) fn build_mapping_rows(
    auth_id: &str,
    mappings: &[NewConsentMapping],
) -> Vec<ConsentMappingResource> {
    mappings
        .iter()
        .map(|m| ConsentMappingResource {
            mapping_id: Uuid::new_v4().to_string(),
            auth_id: auth_id.to_string(),
            account_id: m.account_id.clone(),
            permission: m.permission.clone(),
            mapping_status: m.mapping_status.clone(),
        })
        .collect()
}

pub(crate) fn build_history_row(
    consent_id: &str,
    candidate: &AmendmentCandidate,
) -> Result<ConsentHistoryResource, ConsentError> {
    let snapshot_json = serde_json::to_string(&candidate.detailed_consent)?;
    Ok(ConsentHistoryResource {
        history_id: Uuid::new_v4().to_string(),
        consent_id: consent_id.to_string(),
        amended_time: candidate.amended_time,
        reason: candidate.reason.clone(),
        detailed_consent: candidate.detailed_consent.clone(),
        snapshot_digest: compute_snapshot_digest(&snapshot_json),
    })
}

/// `sha256:<hex>` over the snapshot JSON.
pub(crate) fn compute_snapshot_digest(snapshot_json: &str) -> String {
    let hash = Sha256::digest(snapshot_json.as_bytes());
    format!("sha256:{}", hex::encode(hash))
}
