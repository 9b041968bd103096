//! Record Fetch Interface: the only way the engine reads the backing store.
//!
//! Backends answer an in-set [`Filter`] for one table, restricted to what an
//! optional [`Principal`] may see and excluding archived rows unless asked.

mod filter;
mod memory;
mod sqlite;

pub use filter::Filter;
pub use memory::{FetchCall, MemoryStore};
pub use sqlite::SqliteRecordStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::SchemaConfig;
use crate::error::Result;
use crate::schema::{Record, SchemaCatalog};

/// The acting user or service a fetch is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions<'a> {
    pub principal: Option<&'a Principal>,
    pub include_archived: bool,
}

/// Typed fetch against the backing record store.
pub trait RecordFetch {
    fn fetch(&self, table: &str, filter: &Filter, options: &FetchOptions<'_>) -> Result<Vec<Record>>;
}

/// Decides which rows of a table a principal may see.
///
/// Whenever a principal is supplied, backends AND its restriction into every query.
pub trait ScopePolicy: Send + Sync {
    fn restriction(&self, principal: &Principal, table: &str) -> Filter;
}

/// Every row visible to everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl ScopePolicy for Unrestricted {
    fn restriction(&self, _principal: &Principal, _table: &str) -> Filter {
        Filter::All
    }
}

/// Rows belong to the principal named in `column`; tables without that column are shared.
#[derive(Debug, Clone)]
pub struct ColumnPolicy {
    column: String,
    scoped_tables: BTreeSet<String>,
}

impl ColumnPolicy {
    pub fn new(column: impl Into<String>, scoped_tables: impl IntoIterator<Item = String>) -> Self {
        Self {
            column: column.into(),
            scoped_tables: scoped_tables.into_iter().collect(),
        }
    }

    /// Scope every cataloged table that carries `column`.
    pub fn from_catalog(column: &str, catalog: &SchemaCatalog) -> Self {
        Self::new(
            column,
            catalog
                .tables()
                .filter(|t| t.has_column(column))
                .map(|t| t.name.clone()),
        )
    }
}

impl ScopePolicy for ColumnPolicy {
    fn restriction(&self, principal: &Principal, table: &str) -> Filter {
        if self.scoped_tables.contains(table) {
            Filter::eq(self.column.clone(), principal.id.as_str())
        } else {
            Filter::All
        }
    }
}

/// Policy implied by `[schema] principal_column`: column scoping when set, otherwise none.
pub fn policy_for(schema: &SchemaConfig, catalog: &SchemaCatalog) -> Arc<dyn ScopePolicy> {
    match &schema.principal_column {
        Some(column) => {
            let policy = ColumnPolicy::from_catalog(column, catalog);
            log::info!("Principal scoping on {} across {} tables", column, policy.scoped_tables.len());
            Arc::new(policy)
        }
        None => Arc::new(Unrestricted),
    }
}
