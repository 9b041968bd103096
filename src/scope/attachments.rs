use super::Scope;
use crate::config::AttachableConfig;
use crate::error::Result;
use crate::error::ScopeGraphError;
use crate::fetch::{FetchOptions, Filter, RecordFetch};
use crate::schema::{Record, SchemaCatalog};

/// Full records of one graph type within `scope`, looked up by primary key.
pub fn fetch_members<F: RecordFetch + ?Sized>(
    store: &F,
    catalog: &SchemaCatalog,
    scope: &Scope,
    tag: &str,
    options: &FetchOptions<'_>,
) -> Result<Vec<Record>> {
    let pk = catalog
        .primary_key(tag)
        .ok_or_else(|| ScopeGraphError::InvalidInput(format!("{} has no primary key", tag)))?;
    match scope.ids(tag) {
        Some(ids) => store.fetch(tag, &Filter::is_in(pk, ids.iter().cloned()), options),
        None => Ok(Vec::new()),
    }
}

/// Filter matching attachable rows whose (owner type, owner id) lies in `scope`.
///
/// One `owner_type = tag AND owner_id IN ids` branch per type. An empty scope
/// gives an empty disjunction, which matches nothing.
pub fn owner_filter(scope: &Scope, attachable: &AttachableConfig) -> Filter {
    let any = scope
        .iter()
        .map(|(tag, ids)| {
            Filter::eq(attachable.owner_type_field.clone(), tag)
                .and(Filter::is_in(attachable.owner_id_field.clone(), ids.iter().cloned()))
        })
        .collect();
    Filter::Or { any }
}

/// Fetch every attachable of one kind owned by a member of `scope`.
pub fn fetch_attached<F: RecordFetch + ?Sized>(
    store: &F,
    scope: &Scope,
    attachable: &AttachableConfig,
    options: &FetchOptions<'_>,
) -> Result<Vec<Record>> {
    let filter = owner_filter(scope, attachable);
    if filter.is_empty_match() {
        log::debug!("Empty scope; no {} to fetch", attachable.kind);
        return Ok(Vec::new());
    }
    let records = store.fetch(&attachable.table, &filter, options)?;
    log::debug!(
        "Fetched {} {} attached to {} scoped records",
        records.len(),
        attachable.kind,
        scope.len()
    );
    Ok(records)
}
