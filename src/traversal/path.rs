use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use super::engine::{Edge, Traversal};
use super::{TraversalParams, VisitedSet};
use crate::error::{Result, ScopeGraphError};
use crate::fetch::RecordFetch;
use crate::schema::NodeKey;

/// One hop of an explained path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub record: NodeKey,
    /// Relation followed to the next step; `None` on the final step.
    pub relation: Option<String>,
}

impl<'a, F: RecordFetch + ?Sized> Traversal<'a, F> {
    /// Shortest relation chain from `source` to `target`, for diagnostics.
    ///
    /// Nodes are expanded one at a time rather than in batched layers. Returns
    /// `Ok(None)` when `target` is not reachable within the bounds.
    pub fn explain_path(
        &self,
        source: &NodeKey,
        target: &NodeKey,
        params: &TraversalParams,
    ) -> Result<Option<Vec<PathStep>>> {
        self.warn_unknown_types(params);
        let root = self.resolve_root(source, params)?;

        let mut visited = VisitedSet::default();
        visited.insert(&root.tag, &root.id);
        let mut came_from: HashMap<NodeKey, Edge> = HashMap::new();
        let mut queue = VecDeque::from([(root, 0usize)]);
        let mut polled_depth = 0;

        while let Some((record, depth)) = queue.pop_front() {
            if record.is(target) {
                return Ok(Some(unwind(came_from, target)));
            }
            if params.max_depth.map_or(false, |max| depth >= max) {
                continue;
            }
            if depth >= polled_depth {
                if params.cancel.as_ref().map_or(false, |c| c.is_cancelled()) {
                    return Err(ScopeGraphError::Cancelled);
                }
                polled_depth = depth + 1;
            }

            for (next, edge) in self.expand(std::slice::from_ref(&record), params, &visited)? {
                if visited.insert(&next.tag, &next.id) {
                    came_from.insert(next.key(), edge);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        log::debug!("No path from {} to {}", source, target);
        Ok(None)
    }
}

/// Walk discovery edges back from `target`, labelling each step with the relation leaving it.
fn unwind(mut came_from: HashMap<NodeKey, Edge>, target: &NodeKey) -> Vec<PathStep> {
    let mut steps = vec![PathStep {
        record: target.clone(),
        relation: None,
    }];
    let mut cursor = target.clone();
    while let Some(edge) = came_from.remove(&cursor) {
        steps.push(PathStep {
            record: edge.parent.clone(),
            relation: Some(edge.relation),
        });
        cursor = edge.parent;
    }
    steps.reverse();
    steps
}
