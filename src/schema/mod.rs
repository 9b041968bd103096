//! Record identity and relationship metadata.
//!
//! A [`SchemaCatalog`] is built once at startup (usually by [`introspect`]ing the
//! backing SQLite schema) and then shared read-only by every traversal.

mod catalog;
mod introspect;

pub use catalog::{SchemaCatalog, SchemaCatalogBuilder, TableInfo};
pub use introspect::introspect;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Opaque record identifier, unique within one record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Read an identifier out of a field value. Nulls, floats and structured values are not keys.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RecordId::Int(i) => Value::from(*i),
            RecordId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

/// A (type-tag, identifier) reference to one concrete record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    #[serde(rename = "type")]
    pub tag: String,
    pub id: RecordId,
}

impl NodeKey {
    pub fn new(tag: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            tag: tag.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tag, self.id)
    }
}

/// A resolved row from the record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub tag: String,
    pub id: RecordId,
    pub fields: serde_json::Map<String, Value>,
}

impl Record {
    pub fn new(tag: impl Into<String>, id: impl Into<RecordId>, fields: serde_json::Map<String, Value>) -> Self {
        Self {
            tag: tag.into(),
            id: id.into(),
            fields,
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.tag.clone(), self.id.clone())
    }

    pub fn is(&self, key: &NodeKey) -> bool {
        self.tag == key.tag && self.id == key.id
    }

    /// `None` when the field does not exist at all; `Some(Value::Null)` when it is null.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Which way a traversal walks the relation graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow reverse relations: records pointing at the current one.
    #[default]
    Down,
    /// Follow forward relations: records the current one points at.
    Up,
}

impl Direction {
    pub fn follows(self, kind: RelationKind) -> bool {
        matches!(
            (self, kind),
            (Direction::Down, RelationKind::Reverse) | (Direction::Up, RelationKind::Forward)
        )
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "down" => Ok(Direction::Down),
            "up" => Ok(Direction::Up),
            other => Err(format!("unknown direction '{}', expected 'down' or 'up'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// The source record holds a reference to the target.
    Forward,
    /// The target records hold references back to the source.
    Reverse,
}

/// One edge kind between two record types, seen from `source`.
///
/// Traversing it means: read `source_field` on a source record, then fetch the
/// `target` records whose `target_field` is in the collected values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RelationDescriptor {
    pub name: String,
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub source_field: String,
    pub target_field: String,
    /// Whether one source record can reach several targets through this relation.
    pub many: bool,
}
