use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{RelationDescriptor, RelationKind};
use crate::cache;

/// Column-level facts about one cataloged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    /// Single-column primary key; tables without one are opaque.
    pub primary_key: Option<String>,
    pub columns: BTreeSet<String>,
}

impl TableInfo {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }
}

/// Frozen relationship metadata for every record type.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableInfo>,
    relations: BTreeMap<String, Vec<RelationDescriptor>>,
    opaque: BTreeSet<String>,
    labels: BTreeMap<String, String>,
}

impl SchemaCatalog {
    pub fn builder() -> SchemaCatalogBuilder {
        SchemaCatalogBuilder::default()
    }

    /// Relations whose source is `tag`. Unknown types have none.
    pub fn relations_of(&self, tag: &str) -> &[RelationDescriptor] {
        self.relations.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether traversal may enter records of this type.
    pub fn is_traversable(&self, tag: &str) -> bool {
        self.tables
            .get(tag)
            .map(|t| t.primary_key.is_some() && !self.opaque.contains(tag))
            .unwrap_or(false)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tables.contains_key(tag)
    }

    pub fn table(&self, tag: &str) -> Option<&TableInfo> {
        self.tables.get(tag)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    pub fn primary_key(&self, tag: &str) -> Option<&str> {
        self.tables.get(tag).and_then(|t| t.primary_key.as_deref())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.values().flatten()
    }

    /// Display label for a type tag: configured override, else derived from the tag.
    pub fn label(&self, tag: &str) -> Arc<str> {
        match self.labels.get(tag) {
            Some(label) => Arc::from(label.as_str()),
            None => cache::type_label(tag),
        }
    }

    /// Stable digest of the relation table, for spotting schema drift between deployments.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for table in self.tables.values() {
            hasher.update(table.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(table.primary_key.as_deref().unwrap_or("").as_bytes());
            hasher.update([u8::from(self.is_traversable(&table.name))]);
        }
        for rel in self.descriptors() {
            hasher.update(
                format!(
                    "{}|{}|{}|{:?}|{}|{}|{}\n",
                    rel.name, rel.source, rel.target, rel.kind, rel.source_field, rel.target_field, rel.many
                )
                .as_bytes(),
            );
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone)]
struct ForeignKey {
    table: String,
    column: String,
    references: String,
    referenced_column: Option<String>,
}

/// Collects tables and foreign keys, then freezes them into a [`SchemaCatalog`].
#[derive(Debug, Default)]
pub struct SchemaCatalogBuilder {
    tables: BTreeMap<String, TableInfo>,
    foreign_keys: Vec<ForeignKey>,
    unique: BTreeSet<(String, String)>,
    opaque: BTreeSet<String>,
    labels: BTreeMap<String, String>,
}

impl SchemaCatalogBuilder {
    /// Register a table keyed by a single primary-key column.
    pub fn table(mut self, name: &str, primary_key: &str) -> Self {
        let entry = self.entry(name);
        entry.primary_key = Some(primary_key.to_string());
        entry.columns.insert(primary_key.to_string());
        self
    }

    /// Register a table that has no usable primary key (always opaque).
    pub fn keyless_table(mut self, name: &str) -> Self {
        self.entry(name);
        self
    }

    pub fn columns(mut self, table: &str, columns: &[&str]) -> Self {
        let entry = self.entry(table);
        entry.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// `table.column` references `references.referenced_column` (the primary key when `None`).
    pub fn foreign_key(
        mut self,
        table: &str,
        column: &str,
        references: &str,
        referenced_column: Option<&str>,
    ) -> Self {
        self.entry(table).columns.insert(column.to_string());
        self.foreign_keys.push(ForeignKey {
            table: table.to_string(),
            column: column.to_string(),
            references: references.to_string(),
            referenced_column: referenced_column.map(str::to_string),
        });
        self
    }

    /// Mark `table.column` as unique, making the reverse view single-valued.
    pub fn unique(mut self, table: &str, column: &str) -> Self {
        self.unique.insert((table.to_string(), column.to_string()));
        self
    }

    pub fn opaque(mut self, table: &str) -> Self {
        self.opaque.insert(table.to_string());
        self
    }

    pub fn label(mut self, table: &str, label: &str) -> Self {
        self.labels.insert(table.to_string(), label.to_string());
        self
    }

    fn entry(&mut self, name: &str) -> &mut TableInfo {
        self.tables.entry(name.to_string()).or_insert_with(|| TableInfo {
            name: name.to_string(),
            primary_key: None,
            columns: BTreeSet::new(),
        })
    }

    pub fn build(self) -> SchemaCatalog {
        let mut relations: BTreeMap<String, Vec<RelationDescriptor>> = BTreeMap::new();

        for fk in &self.foreign_keys {
            let Some(referenced) = self.tables.get(&fk.references) else {
                log::debug!(
                    "Skipping {}.{}: referenced table {} is not cataloged",
                    fk.table, fk.column, fk.references
                );
                continue;
            };
            let Some(referenced_column) = fk
                .referenced_column
                .clone()
                .or_else(|| referenced.primary_key.clone())
            else {
                log::debug!(
                    "Skipping {}.{}: {} has no primary key to reference",
                    fk.table, fk.column, fk.references
                );
                continue;
            };

            relations.entry(fk.table.clone()).or_default().push(RelationDescriptor {
                name: fk.column.clone(),
                source: fk.table.clone(),
                target: fk.references.clone(),
                kind: RelationKind::Forward,
                source_field: fk.column.clone(),
                target_field: referenced_column.clone(),
                many: false,
            });

            let unique = self.unique.contains(&(fk.table.clone(), fk.column.clone()));
            relations.entry(fk.references.clone()).or_default().push(RelationDescriptor {
                name: format!("{}.{}", fk.table, fk.column),
                source: fk.references.clone(),
                target: fk.table.clone(),
                kind: RelationKind::Reverse,
                source_field: referenced_column,
                target_field: fk.column.clone(),
                many: !unique,
            });
        }

        for list in relations.values_mut() {
            list.sort();
            list.dedup();
        }

        SchemaCatalog {
            tables: self.tables,
            relations,
            opaque: self.opaque,
            labels: self.labels,
        }
    }
}
