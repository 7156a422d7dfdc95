//! Multi-criteria consent search and detailed-view assembly.

use crate::errors::ConsentError;
use crate::model::{ConsentSearchFilter, DetailedConsentResource};
use crate::search::{BindValue, PredicateBuilder};
use crate::store::rows::to_epoch;
use crate::store::store_internal::{attributes, authorization, consent, mapping};
use rusqlite::{params_from_iter, Connection};

/// Page of consent ids matching the filter, most recently updated first.
///
/// Consent-id lists are OR-chained and the chain is ANDed with every other
/// dimension; the other membership dimensions use IN-lists below the
/// builder's fallback threshold. The user-id dimension constrains the
/// joined authorization rows, hence the DISTINCT.
pub(crate) fn search_consent_ids_impl(
    conn: &Connection,
    filter: &ConsentSearchFilter,
    or_chain_threshold: usize,
) -> Result<Vec<String>, ConsentError> {
    let mut builder = PredicateBuilder::with_or_chain_threshold(or_chain_threshold);
    builder.eq("c.org_id", filter.org_id.as_str());
    builder.or_chain("c.consent_id", &filter.consent_ids);
    builder.in_list("c.client_id", &filter.client_ids);
    builder.in_list("c.consent_type", &filter.consent_types);
    builder.in_list("c.current_status", &filter.consent_statuses);
    builder.in_list("a.user_id", &filter.user_ids);
    builder.time_range(
        "c.updated_time",
        filter.from_time.map(to_epoch),
        filter.to_time.map(to_epoch),
    );
    let predicate = builder.build();

    let mut binds: Vec<BindValue> = predicate.binds().to_vec();
    binds.push((filter.limit.map(i64::from).unwrap_or(i64::MAX)).into());
    binds.push((filter.offset.map(i64::from).unwrap_or(0)).into());

    let sql = format!(
        "SELECT DISTINCT c.consent_id, c.updated_time FROM consent c \
         LEFT JOIN authorization a ON a.consent_id = c.consent_id{} \
         ORDER BY c.updated_time DESC, c.consent_id ASC LIMIT ? OFFSET ?",
        predicate.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(binds.iter()), |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Assembles the composite view for one consent from the four operational
/// tables. Runs on one connection state; the caller owns the transaction
/// or lock that makes the read internally consistent.
pub(crate) fn assemble_detail_impl(
    conn: &Connection,
    consent_id: &str,
    org_id: &str,
) -> Result<Option<DetailedConsentResource>, ConsentError> {
    let Some(consent_row) = consent::get_consent_impl(conn, consent_id, org_id)? else {
        return Ok(None);
    };
    let authorizations = authorization::list_authorizations_impl(conn, consent_id)?;
    let mappings = mapping::list_mappings_for_consent_impl(conn, consent_id)?;
    let attrs = attributes::get_attributes_impl(conn, consent_id)?;
    Ok(Some(DetailedConsentResource {
        consent: consent_row,
        authorizations,
        mappings,
        attributes: attrs,
    }))
}
