use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{FetchOptions, Filter, RecordFetch, ScopePolicy};
use crate::error::{Result, ScopeGraphError};
use crate::schema::{Record, RecordId};

/// One observed call, kept so callers can assert on batching.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
    pub table: String,
    pub filter: Filter,
}

/// In-memory [`RecordFetch`] with the same archived/principal semantics as the SQLite store.
///
/// Records are keyed by their `id` field.
pub struct MemoryStore {
    tables: BTreeMap<String, BTreeMap<RecordId, Record>>,
    policy: Option<Box<dyn ScopePolicy>>,
    archived_column: String,
    failing: BTreeSet<String>,
    calls: Mutex<Vec<FetchCall>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            policy: None,
            archived_column: "archived_at".to_string(),
            failing: BTreeSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_policy(mut self, policy: impl ScopePolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Insert or replace a record. Non-object `fields` are treated as empty.
    pub fn insert(&mut self, table: &str, id: impl Into<RecordId>, fields: Value) -> &mut Self {
        let id = id.into();
        let mut fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.insert("id".to_string(), id.to_json());
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id.clone(), Record::new(table, id, fields));
        self
    }

    /// Make every fetch against `table` fail, to exercise error propagation.
    pub fn fail_table(&mut self, table: &str) -> &mut Self {
        self.failing.insert(table.to_string());
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.lock_calls().clone()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<FetchCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordFetch for MemoryStore {
    fn fetch(&self, table: &str, filter: &Filter, options: &FetchOptions<'_>) -> Result<Vec<Record>> {
        self.lock_calls().push(FetchCall {
            table: table.to_string(),
            filter: filter.clone(),
        });

        if self.failing.contains(table) {
            return Err(ScopeGraphError::fetch(table, "injected failure"));
        }

        let mut effective = filter.clone();
        if !options.include_archived {
            effective = effective.and(Filter::is_null(self.archived_column.clone()));
        }
        if let (Some(principal), Some(policy)) = (options.principal, &self.policy) {
            effective = effective.and(policy.restriction(principal, table));
        }

        Ok(self
            .tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|r| effective.matches(&r.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
