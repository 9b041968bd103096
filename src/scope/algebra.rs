use indexmap::IndexMap;

use super::Scope;
use crate::schema::SchemaCatalog;

/// Per-type union of any number of scopes. Types keep first-seen order.
pub fn merge_scopes(scopes: &[&Scope]) -> Scope {
    let mut merged = Scope::new();
    for scope in scopes {
        for (tag, ids) in scope.iter() {
            merged.extend_type(tag, ids.iter().cloned());
        }
    }
    merged
}

/// Per-type difference `a - b`. Types absent from `b` pass through; types left
/// empty are dropped.
pub fn subtract_scope(a: &Scope, b: &Scope) -> Scope {
    let mut result = Scope::new();
    for (tag, ids) in a.iter() {
        match b.ids(tag) {
            Some(removed) => result.extend_type(tag, ids.difference(removed).cloned()),
            None => result.extend_type(tag, ids.iter().cloned()),
        }
    }
    result
}

/// Record counts keyed by display label. Tags sharing a label are summed.
pub fn count_by_type(scope: &Scope, catalog: &SchemaCatalog) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for (tag, ids) in scope.iter() {
        *counts.entry(catalog.label(tag).to_string()).or_insert(0) += ids.len();
    }
    counts
}
