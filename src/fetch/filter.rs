use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::schema::RecordId;

/// Row predicate understood by every [`RecordFetch`](super::RecordFetch) backend.
///
/// Empty `In` sets and empty `Or` lists match nothing; an empty `And` matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    All,
    Nothing,
    In { field: String, values: BTreeSet<RecordId> },
    Eq { field: String, value: RecordId },
    IsNull { field: String },
    And { all: Vec<Filter> },
    Or { any: Vec<Filter> },
}

impl Filter {
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = RecordId>) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<RecordId>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull { field: field.into() }
    }

    /// Conjunction that folds away `All` and short-circuits on `Nothing`.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::Nothing, _) | (_, Filter::Nothing) => Filter::Nothing,
            (Filter::And { mut all }, Filter::And { all: rest }) => {
                all.extend(rest);
                Filter::And { all }
            }
            (Filter::And { mut all }, f) | (f, Filter::And { mut all }) => {
                all.push(f);
                Filter::And { all }
            }
            (a, b) => Filter::And { all: vec![a, b] },
        }
    }

    /// True when no row can ever match.
    pub fn is_empty_match(&self) -> bool {
        match self {
            Filter::Nothing => true,
            Filter::In { values, .. } => values.is_empty(),
            Filter::Or { any } => any.iter().all(Filter::is_empty_match),
            Filter::And { all } => all.iter().any(Filter::is_empty_match),
            _ => false,
        }
    }

    /// Evaluate against a record's fields. A missing field behaves like null.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        let key_of = |field: &str| fields.get(field).and_then(RecordId::from_json);
        match self {
            Filter::All => true,
            Filter::Nothing => false,
            Filter::In { field, values } => key_of(field).map_or(false, |v| values.contains(&v)),
            Filter::Eq { field, value } => key_of(field).as_ref() == Some(value),
            Filter::IsNull { field } => fields.get(field).map_or(true, Value::is_null),
            Filter::And { all } => all.iter().all(|f| f.matches(fields)),
            Filter::Or { any } => any.iter().any(|f| f.matches(fields)),
        }
    }
}
