//! Build a [`SchemaCatalog`] from live SQLite schema metadata.

use rusqlite::Connection;
use std::collections::BTreeMap;

use super::SchemaCatalog;
use crate::config::SchemaConfig;
use crate::db::migrate::MIGRATIONS_TABLE;
use crate::error::{Result, ScopeGraphError};

/// Walk `sqlite_master` and the table/foreign-key/index pragmas once, freezing the result.
pub fn introspect(conn: &Connection, config: &SchemaConfig) -> Result<SchemaCatalog> {
    let tables = list_tables(conn)?;
    let mut builder = SchemaCatalog::builder();

    for table in &tables {
        if table == MIGRATIONS_TABLE || config.ignored_tables.contains(table) {
            continue;
        }

        let columns = table_columns(conn, table)?;
        let pk: Vec<&str> = columns
            .iter()
            .filter(|(_, pk)| *pk > 0)
            .map(|(name, _)| name.as_str())
            .collect();
        let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();

        builder = match pk.as_slice() {
            [single] => builder.table(table, single),
            _ => {
                log::debug!("Table {} has no single-column primary key; cataloged as opaque", table);
                builder.keyless_table(table)
            }
        };
        builder = builder.columns(table, &names);

        for (column, references, referenced_column) in foreign_keys(conn, table)? {
            if references == MIGRATIONS_TABLE || config.ignored_tables.contains(&references) {
                continue;
            }
            builder = builder.foreign_key(table, &column, &references, referenced_column.as_deref());
        }

        for column in unique_columns(conn, table)? {
            builder = builder.unique(table, &column);
        }
    }

    for table in &config.opaque_tables {
        builder = builder.opaque(table);
    }
    for (table, label) in &config.labels {
        builder = builder.label(table, label);
    }

    let catalog = builder.build();
    log::info!(
        "Schema catalog: {} tables, {} relations (fingerprint {})",
        catalog.tables().count(),
        catalog.descriptors().count(),
        &catalog.fingerprint()[..12]
    );
    Ok(catalog)
}

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// (column name, primary-key position) pairs in declaration order.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    if columns.is_empty() {
        return Err(ScopeGraphError::Schema(format!("table {} has no columns", table)));
    }
    Ok(columns)
}

/// Single-column foreign keys as (column, referenced table, referenced column).
/// Composite keys cannot be expressed as one in-set filter and are left out.
fn foreign_keys(conn: &Connection, table: &str) -> Result<Vec<(String, String, Option<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let rows = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut grouped: BTreeMap<i64, Vec<(String, String, Option<String>)>> = BTreeMap::new();
    for (id, references, from, to) in rows {
        grouped.entry(id).or_default().push((from, references, to));
    }

    Ok(grouped
        .into_iter()
        .filter_map(|(_, mut parts)| {
            if parts.len() == 1 {
                parts.pop()
            } else {
                log::debug!("Skipping composite foreign key on {}", table);
                None
            }
        })
        .collect())
}

fn unique_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1")?;
    let indexes = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut columns = Vec::new();
    for index in indexes {
        let mut stmt = conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
        let indexed = stmt
            .query_map([&index], |row| row.get::<_, Option<String>>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        if let [Some(column)] = indexed.as_slice() {
            columns.push(column.clone());
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use crate::schema::RelationKind;
    use std::path::Path;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        migrate::run_migrations(&mut conn, &migrations_dir).unwrap();
        conn
    }

    #[test]
    fn test_introspect_discovers_foreign_keys() {
        let conn = migrated();
        let catalog = introspect(&conn, &SchemaConfig::default()).unwrap();

        assert!(catalog.contains("orders"));
        assert!(!catalog.contains(MIGRATIONS_TABLE));
        assert_eq!(catalog.primary_key("work_orders"), Some("id"));

        let reverse: Vec<_> = catalog
            .relations_of("orders")
            .iter()
            .filter(|r| r.kind == RelationKind::Reverse)
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(reverse, vec!["work_orders"]);

        let forward = catalog
            .relations_of("orders")
            .iter()
            .find(|r| r.kind == RelationKind::Forward)
            .unwrap();
        assert_eq!(forward.target, "customers");
        assert_eq!(forward.source_field, "customer_id");
        assert_eq!(forward.target_field, "id");
    }

    #[test]
    fn test_introspect_unique_index_makes_single_valued_reverse() {
        let conn = migrated();
        let catalog = introspect(&conn, &SchemaConfig::default()).unwrap();
        let spec = catalog
            .relations_of("parts")
            .iter()
            .find(|r| r.target == "part_specs")
            .unwrap();
        assert!(!spec.many);

        let parts = catalog
            .relations_of("work_orders")
            .iter()
            .find(|r| r.target == "parts")
            .unwrap();
        assert!(parts.many);
    }

    #[test]
    fn test_introspect_applies_config() {
        let conn = migrated();
        let config = SchemaConfig {
            opaque_tables: vec!["documents".to_string()],
            ignored_tables: vec!["part_specs".to_string()],
            labels: [("work_orders".to_string(), "Job".to_string())].into_iter().collect(),
            ..SchemaConfig::default()
        };
        let catalog = introspect(&conn, &config).unwrap();

        assert!(catalog.contains("documents"));
        assert!(!catalog.is_traversable("documents"));
        assert!(!catalog.contains("part_specs"));
        assert!(catalog.relations_of("parts").iter().all(|r| r.target != "part_specs"));
        assert_eq!(&*catalog.label("work_orders"), "Job");
    }

    #[test]
    fn test_composite_keys_are_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (x INTEGER, y INTEGER, PRIMARY KEY (x, y));
             CREATE TABLE b (id INTEGER PRIMARY KEY, ax INTEGER, ay INTEGER,
                 FOREIGN KEY (ax, ay) REFERENCES a(x, y));",
        )
        .unwrap();
        let catalog = introspect(&conn, &SchemaConfig::default()).unwrap();
        assert!(!catalog.is_traversable("a"));
        assert!(catalog.is_traversable("b"));
        assert!(catalog.relations_of("b").is_empty());
    }
}
