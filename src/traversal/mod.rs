//! Breadth-first, depth-bounded closure computation over the relation graph.
//!
//! One primitive walks the graph a layer at a time, issuing a single batched
//! fetch per (parent type, target type, relation) per depth. Three products
//! are built on it: flat closures, nested structures, and first-match search.
//! Shortest-path diagnostics reuse the same relation discovery one node at a time.

mod engine;
mod path;
mod structure;
mod visited;

pub use engine::Traversal;
pub use path::PathStep;
pub use structure::{StructureBuilder, StructureNode};
pub use visited::VisitedSet;

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::fetch::Principal;
use crate::schema::{Direction, NodeKey};
use crate::scope::Scope;

/// Cooperative cancellation handle, polled once per depth layer.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Knobs shared by every traversal product.
#[derive(Debug, Clone, Default)]
pub struct TraversalParams {
    pub direction: Direction,
    /// `None` walks until the frontier is exhausted.
    pub max_depth: Option<usize>,
    /// When set, only these target types are followed.
    pub include_types: Option<BTreeSet<String>>,
    /// Never followed; wins over `include_types`.
    pub exclude_types: BTreeSet<String>,
    pub principal: Option<Principal>,
    pub include_archived: bool,
    pub cancel: Option<Cancellation>,
}

impl TraversalParams {
    pub fn down() -> Self {
        Self::default()
    }

    pub fn up() -> Self {
        Self {
            direction: Direction::Up,
            ..Self::default()
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn include<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }

    pub fn cancel_on(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Every record reachable from `root`, root included and listed first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosureResult {
    pub root: NodeKey,
    /// Deepest layer that contributed at least one record.
    pub depth_reached: usize,
    pub scope: Scope,
}

impl ClosureResult {
    pub fn into_scope(self) -> Scope {
        self.scope
    }
}
