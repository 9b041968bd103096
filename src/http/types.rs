use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::TraversalConfig;
use crate::fetch::Principal;
use crate::schema::{Direction, NodeKey, Record, RelationDescriptor};
use crate::traversal::{PathStep, TraversalParams};

/// Traversal knobs shared by every request body.
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalRequest {
    pub root: NodeKey,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub include_types: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_types: Vec<String>,
    #[serde(default)]
    pub include_archived: Option<bool>,
}

impl TraversalRequest {
    pub fn new(root: NodeKey) -> Self {
        Self {
            root,
            direction: Direction::Down,
            max_depth: None,
            include_types: None,
            exclude_types: Vec::new(),
            include_archived: None,
        }
    }

    /// Resolve against configured defaults. Depth is always capped by `max_depth_limit`.
    pub fn params(&self, limits: &TraversalConfig, principal: Option<Principal>) -> TraversalParams {
        let mut params = TraversalParams {
            direction: self.direction,
            max_depth: Some(limits.effective_depth(self.max_depth)),
            include_archived: self.include_archived.unwrap_or(limits.include_archived),
            principal,
            ..TraversalParams::default()
        };
        if let Some(include) = &self.include_types {
            params = params.include(include.iter().cloned());
        }
        params.exclude(self.exclude_types.iter().cloned())
    }
}

/// `POST /scope`
#[derive(Debug, Deserialize)]
pub struct ScopeRequest {
    #[serde(flatten)]
    pub traversal: TraversalRequest,
    /// Graph types or attachable kinds to return records for.
    #[serde(default)]
    pub kinds: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub root: NodeKey,
    pub generated_at: String,
    pub depth_reached: usize,
    pub counts: IndexMap<String, usize>,
    pub records: IndexMap<String, Vec<Record>>,
}

/// `POST /path`
#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub source: NodeKey,
    pub target: NodeKey,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub include_types: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_types: Vec<String>,
    #[serde(default)]
    pub include_archived: Option<bool>,
}

impl PathRequest {
    /// The same knobs as a traversal rooted at `source`.
    pub fn traversal(&self) -> TraversalRequest {
        TraversalRequest {
            root: self.source.clone(),
            direction: self.direction,
            max_depth: self.max_depth,
            include_types: self.include_types.clone(),
            exclude_types: self.exclude_types.clone(),
            include_archived: self.include_archived,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub source: NodeKey,
    pub target: NodeKey,
    pub found: bool,
    pub steps: Vec<PathStep>,
}

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub label: String,
    pub primary_key: Option<String>,
    pub traversable: bool,
}

/// `GET /schema`
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub fingerprint: String,
    pub tables: Vec<TableSummary>,
    pub relations: Vec<RelationDescriptor>,
}
