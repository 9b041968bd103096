use base64::{engine::general_purpose::STANDARD, Engine as _};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::{Map, Value};

use super::{FetchOptions, Filter, RecordFetch, ScopePolicy, Unrestricted};
use crate::error::{Result, ScopeGraphError};
use crate::schema::{Record, RecordId, SchemaCatalog};

const ROWID_ALIAS: &str = "__rowid";

/// Largest `IN (?, ..)` list bound in one statement; bigger sets are queried in chunks.
const MAX_IN_VALUES: usize = 500;

/// [`RecordFetch`] over a SQLite connection, one parameterised SELECT per call.
pub struct SqliteRecordStore<'c> {
    conn: &'c Connection,
    catalog: &'c SchemaCatalog,
    policy: &'c dyn ScopePolicy,
    archived_column: String,
}

impl<'c> SqliteRecordStore<'c> {
    pub fn new(conn: &'c Connection, catalog: &'c SchemaCatalog) -> Self {
        Self {
            conn,
            catalog,
            policy: &Unrestricted,
            archived_column: "archived_at".to_string(),
        }
    }

    pub fn with_policy(mut self, policy: &'c dyn ScopePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_archived_column(mut self, column: impl Into<String>) -> Self {
        self.archived_column = column.into();
        self
    }

    fn effective_filter(&self, table: &str, filter: &Filter, options: &FetchOptions<'_>) -> Filter {
        let mut effective = filter.clone();
        let has_archive_marker = self
            .catalog
            .table(table)
            .map_or(false, |t| t.has_column(&self.archived_column));
        if !options.include_archived && has_archive_marker {
            effective = effective.and(Filter::is_null(self.archived_column.clone()));
        }
        if let Some(principal) = options.principal {
            effective = effective.and(self.policy.restriction(principal, table));
        }
        effective
    }
}

impl RecordFetch for SqliteRecordStore<'_> {
    fn fetch(&self, table: &str, filter: &Filter, options: &FetchOptions<'_>) -> Result<Vec<Record>> {
        match filter {
            Filter::In { field, values } if values.len() > MAX_IN_VALUES => {
                let values: Vec<RecordId> = values.iter().cloned().collect();
                let mut records = Vec::new();
                for chunk in values.chunks(MAX_IN_VALUES) {
                    let part = Filter::is_in(field.clone(), chunk.iter().cloned());
                    records.extend(self.fetch_once(table, &part, options)?);
                }
                records.sort_by(|a, b| a.id.cmp(&b.id));
                records.dedup_by(|a, b| a.id == b.id);
                Ok(records)
            }
            _ => self.fetch_once(table, filter, options),
        }
    }
}

impl SqliteRecordStore<'_> {
    fn fetch_once(&self, table: &str, filter: &Filter, options: &FetchOptions<'_>) -> Result<Vec<Record>> {
        let info = self
            .catalog
            .table(table)
            .ok_or_else(|| ScopeGraphError::fetch(table, "table is not cataloged"))?;

        let effective = self.effective_filter(table, filter, options);
        if effective.is_empty_match() {
            return Ok(Vec::new());
        }

        let mut params = Vec::new();
        let predicate = render(&effective, &mut params);
        let (select, order) = match &info.primary_key {
            Some(pk) => ("*".to_string(), quote_ident(pk)),
            None => (format!("rowid AS {}, *", quote_ident(ROWID_ALIAS)), "rowid".to_string()),
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            select,
            quote_ident(table),
            predicate,
            order
        );
        log::trace!("fetch {}: {}", table, sql);

        let mut stmt = self.conn.prepare(&sql).map_err(|e| ScopeGraphError::fetch(table, e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let id_column = info.primary_key.clone().unwrap_or_else(|| ROWID_ALIAS.to_string());

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(|e| ScopeGraphError::fetch(table, e))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|e| ScopeGraphError::fetch(table, e))? {
            let mut fields = Map::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(|e| ScopeGraphError::fetch(table, e))?;
                fields.insert(column.clone(), to_json(value));
            }
            let id = fields.get(&id_column).and_then(RecordId::from_json);
            if info.primary_key.is_none() {
                fields.remove(ROWID_ALIAS);
            }
            match id {
                Some(id) => records.push(Record::new(table, id, fields)),
                None => log::debug!("Skipping {} row with no usable key", table),
            }
        }
        Ok(records)
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a filter as a SQL predicate, appending bound parameters.
fn render(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
    match filter {
        Filter::All => "1".to_string(),
        Filter::Nothing => "0".to_string(),
        Filter::In { values, .. } if values.is_empty() => "0".to_string(),
        Filter::In { field, values } => {
            // A plain value list, so the column's affinity applies to each value.
            params.extend(values.iter().map(to_sql));
            let placeholders = vec!["?"; values.len()].join(", ");
            format!("{} IN ({})", quote_ident(field), placeholders)
        }
        Filter::Eq { field, value } => {
            params.push(to_sql(value));
            format!("{} = ?", quote_ident(field))
        }
        Filter::IsNull { field } => format!("{} IS NULL", quote_ident(field)),
        Filter::And { all } if all.is_empty() => "1".to_string(),
        Filter::And { all } => join(all, " AND ", params),
        Filter::Or { any } if any.is_empty() => "0".to_string(),
        Filter::Or { any } => join(any, " OR ", params),
    }
}

fn join(filters: &[Filter], sep: &str, params: &mut Vec<SqlValue>) -> String {
    let parts: Vec<String> = filters.iter().map(|f| format!("({})", render(f, params))).collect();
    parts.join(sep)
}

fn to_sql(id: &RecordId) -> SqlValue {
    match id {
        RecordId::Int(i) => SqlValue::Integer(*i),
        RecordId::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}
