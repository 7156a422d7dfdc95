//! End-to-end lifecycle scenarios driven through the public service API.

use consent_core::model::{auth_status, mapping_status, status};
use consent_core::{
    AmendmentCandidate, AuditSearchFilter, BulkStatusUpdate, ConsentService, ConsentStore,
    ErrorKind, NewAuthorization, NewConsent,
};
use std::collections::HashMap;

fn service() -> ConsentService {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    ConsentService::new(ConsentStore::memory().unwrap())
}

fn accounts_consent(org: &str, client: &str) -> NewConsent {
    NewConsent {
        org_id: org.to_string(),
        client_id: client.to_string(),
        receipt: r#"{"permissions":["ReadAccountsBasic","ReadBalances"]}"#.to_string(),
        consent_type: "accounts".to_string(),
        current_status: status::RECEIVED.to_string(),
        consent_frequency: 1,
        validity_period: 0,
        recurring_indicator: false,
        attributes: HashMap::new(),
    }
}

fn user_auth(user: &str) -> NewAuthorization {
    NewAuthorization {
        user_id: Some(user.to_string()),
        auth_status: auth_status::CREATED.to_string(),
        auth_type: "authorization".to_string(),
    }
}

/// Scenario A: create with no authorizations, read back the detailed view.
#[test]
fn create_then_get_detailed_returns_empty_authorizations_and_one_audit_record(
) -> anyhow::Result<()> {
    let svc = service();
    let created = svc.create_consent(&accounts_consent("org1", "app-1"), &[])?;

    let detail = svc.get_detailed_consent(&created.consent.consent_id, "org1")?;
    assert_eq!(detail.consent.consent_type, "accounts");
    assert_eq!(detail.consent.consent_frequency, 1);
    assert!(detail.authorizations.is_empty());
    assert!(detail.mappings.is_empty());

    let audit = svc.search_consent_status_audit_records(&AuditSearchFilter {
        consent_id: Some(detail.consent.consent_id.clone()),
        ..Default::default()
    })?;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].previous_status, None);
    assert_eq!(audit[0].current_status, status::RECEIVED);
    Ok(())
}

/// Scenario B: two authorizations, then a revocation-style status update
/// that leaves the children untouched.
#[test]
fn status_update_leaves_sibling_authorizations_untouched() {
    let svc = service();
    let created = svc.create_consent(&accounts_consent("org1", "app-1"), &[]).unwrap();
    let consent_id = created.consent.consent_id.clone();

    let a1 = svc
        .create_consent_authorization(&consent_id, &user_auth("alice@bank"))
        .unwrap();
    let a2 = svc
        .create_consent_authorization(&consent_id, &user_auth("bob@bank"))
        .unwrap();

    svc.update_consent_status(
        &consent_id,
        status::REVOKED,
        Some("alice@bank"),
        Some("user action"),
        "org1",
    )
    .unwrap();

    let detail = svc.get_detailed_consent(&consent_id, "org1").unwrap();
    assert_eq!(detail.consent.current_status, status::REVOKED);

    let audit = svc
        .search_consent_status_audit_records(&AuditSearchFilter {
            consent_id: Some(consent_id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(audit.len(), 2, "create + revoke");
    assert_eq!(audit[1].previous_status.as_deref(), Some(status::RECEIVED));
    assert_eq!(audit[1].action_by.as_deref(), Some("alice@bank"));
    assert_eq!(audit[1].reason.as_deref(), Some("user action"));

    // a plain status update does not cascade to authorization resources
    for auth in [&a1, &a2] {
        let got = svc.get_authorization_resource(&auth.auth_id, "org1").unwrap();
        assert_eq!(got.auth_status, auth_status::CREATED);
    }
}

/// Scenario C: bulk transition touches exactly the matching consents.
#[test]
fn bulk_update_transitions_exactly_the_matching_consents() {
    let svc = service();

    let mut matching_ids = Vec::new();
    for st in [status::ACTIVE, status::AUTHORIZED, status::ACTIVE] {
        let mut consent = accounts_consent("org1", "app-x");
        consent.current_status = st.to_string();
        matching_ids.push(svc.create_consent(&consent, &[]).unwrap().consent.consent_id);
    }
    // non-matching: wrong type, wrong current status
    let mut payments = accounts_consent("org1", "app-x");
    payments.consent_type = "payments".to_string();
    payments.current_status = status::ACTIVE.to_string();
    let payments_id = svc.create_consent(&payments, &[]).unwrap().consent.consent_id;
    let mut rejected = accounts_consent("org1", "app-x");
    rejected.current_status = status::REJECTED.to_string();
    let rejected_id = svc.create_consent(&rejected, &[]).unwrap().consent.consent_id;

    let mut affected = svc
        .bulk_update_consent_status(
            &BulkStatusUpdate {
                org_id: "org1".to_string(),
                client_id: "app-x".to_string(),
                consent_type: "accounts".to_string(),
                new_status: status::EXPIRED.to_string(),
                applicable_statuses: vec![
                    status::ACTIVE.to_string(),
                    status::AUTHORIZED.to_string(),
                ],
                user_id: Some("system".to_string()),
                reason: Some("ttl".to_string()),
            },
            None,
        )
        .unwrap();
    affected.sort();
    let mut expected = matching_ids.clone();
    expected.sort();
    assert_eq!(affected, expected);

    for id in &matching_ids {
        let detail = svc.get_detailed_consent(id, "org1").unwrap();
        assert_eq!(detail.consent.current_status, status::EXPIRED);
        let audit = svc
            .get_consent_status_audit_records(&[id.clone()], 100, 0)
            .unwrap();
        assert_eq!(audit.len(), 2, "create + bulk transition for {id}");
    }
    for id in [&payments_id, &rejected_id] {
        let audit = svc.get_consent_status_audit_records(&[id.clone()], 100, 0).unwrap();
        assert_eq!(audit.len(), 1, "non-matching consent {id} was touched");
    }
}

/// Scenario D: the stored snapshot stays bit-identical regardless of later
/// mutations.
#[test]
fn amendment_snapshot_is_immune_to_later_status_updates() {
    let svc = service();
    let created = svc
        .create_consent(
            &accounts_consent("org1", "app-1"),
            &[user_auth("alice@bank")],
        )
        .unwrap();
    let consent_id = created.consent.consent_id.clone();

    let snapshot_before_amend = svc.get_detailed_consent(&consent_id, "org1").unwrap();
    let amended_time = chrono::Utc::now();
    svc.store_consent_amendment_history(
        &consent_id,
        &AmendmentCandidate {
            amended_time,
            reason: Some("validity extended".to_string()),
            detailed_consent: snapshot_before_amend.clone(),
        },
        &snapshot_before_amend,
    )
    .unwrap();

    svc.update_consent_status(&consent_id, status::AUTHORIZED, None, None, "org1")
        .unwrap();

    let history = svc.get_consent_amendment_history(&consent_id).unwrap();
    let at_timestamp: Vec<_> = history
        .iter()
        .filter(|h| h.amended_time.timestamp() == amended_time.timestamp())
        .collect();
    assert_eq!(at_timestamp.len(), 1);
    assert_eq!(at_timestamp[0].detailed_consent, snapshot_before_amend);
    assert_eq!(
        at_timestamp[0].detailed_consent.consent.current_status,
        status::RECEIVED
    );
}

/// Cascade delete retains the audit trail.
#[test]
fn delete_consent_cascades_but_audit_survives() {
    let svc = service();
    let created = svc
        .create_consent(
            &accounts_consent("org1", "app-1"),
            &[user_auth("alice@bank")],
        )
        .unwrap();
    let consent_id = created.consent.consent_id.clone();

    assert!(svc.delete_consent(&consent_id).unwrap());

    let err = svc.get_detailed_consent(&consent_id, "org1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let audit = svc
        .get_consent_status_audit_records(&[consent_id], 100, 0)
        .unwrap();
    assert_eq!(audit.len(), 1);
}

/// Revocation cascade moves children with the consent.
#[test]
fn revoke_consent_cascades_to_children() {
    let svc = service();
    let created = svc
        .create_consent(
            &accounts_consent("org1", "app-1"),
            &[user_auth("alice@bank")],
        )
        .unwrap();
    let consent_id = created.consent.consent_id.clone();
    let auth_id = created.authorizations[0].auth_id.clone();
    svc.create_consent_mappings(
        &auth_id,
        &[consent_core::NewConsentMapping {
            account_id: "acc-001".to_string(),
            permission: "ReadBalances".to_string(),
            mapping_status: mapping_status::ACTIVE.to_string(),
        }],
    )
    .unwrap();
    assert_eq!(svc.get_consent_mappings(&auth_id).unwrap().len(), 1);

    assert!(svc
        .revoke_consent(&consent_id, "org1", Some("alice@bank"), Some("user action"))
        .unwrap());

    let detail = svc.get_detailed_consent(&consent_id, "org1").unwrap();
    assert_eq!(detail.consent.current_status, status::REVOKED);
    assert_eq!(detail.authorizations[0].auth_status, auth_status::REVOKED);
    assert_eq!(detail.mappings[0].mapping_status, mapping_status::INACTIVE);
}
