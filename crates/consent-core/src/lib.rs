//! Consent and authorization lifecycle engine.
//!
//! A transactional store and service layer for "consent" records: grants a
//! client application holds against a customer's data at an institution.
//! The engine owns consent creation, authorization management, status
//! transitions with an append-only audit trail, key/value attributes,
//! point-in-time amendment history and multi-criteria search. It is
//! consumed in-process; HTTP routing, token issuance and notification
//! delivery live with the callers.
//!
//! Entry points: [`ConsentService`] over a [`ConsentStore`].

pub mod errors;
pub mod model;
pub mod search;
pub mod service;
pub mod store;

pub use errors::{ConsentError, ErrorKind};
pub use model::{
    AmendmentCandidate, AuditSearchFilter, AuthorizationResource, AuthorizationUpdate,
    BulkStatusUpdate, ConsentHistoryResource, ConsentMappingResource, ConsentResource,
    ConsentSearchFilter, ConsentStatusAuditRecord, DetailedConsentResource, NewAuthorization,
    NewConsent, NewConsentMapping,
};
pub use service::{ConsentService, ServiceConfig};
pub use store::{ConsentStore, RevocationParams};
