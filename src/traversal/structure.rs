use serde::Serialize;
use std::collections::HashMap;

use crate::schema::{NodeKey, Record};

/// One record in a nested traversal view, with the records it led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureNode {
    pub record: Record,
    /// Relation followed from the parent; `None` at the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    pub children: Vec<StructureNode>,
}

impl StructureNode {
    fn leaf(record: Record, relation: Option<String>) -> Self {
        Self {
            record,
            relation,
            children: Vec::new(),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.record.key()
    }

    pub fn child(&self, key: &NodeKey) -> Option<&StructureNode> {
        self.children.iter().find(|c| c.record.is(key))
    }

    /// Depth-first search for a node anywhere below (or at) this one.
    pub fn find(&self, key: &NodeKey) -> Option<&StructureNode> {
        if self.record.is(key) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(key))
    }

    /// Number of nodes in this subtree, including this one.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(StructureNode::len).sum::<usize>()
    }
}

/// Splices discovery events into a [`StructureNode`] tree as they arrive.
///
/// Where each node lives is tracked in a side table of child-index paths, so the
/// domain records never carry any traversal bookkeeping.
pub struct StructureBuilder {
    root: StructureNode,
    positions: HashMap<NodeKey, Vec<usize>>,
}

impl StructureBuilder {
    pub fn new(root: Record) -> Self {
        let mut positions = HashMap::new();
        positions.insert(root.key(), Vec::new());
        Self {
            root: StructureNode::leaf(root, None),
            positions,
        }
    }

    /// Attach `record` under `parent`. Returns `false` (and drops the record from
    /// this view only) when the parent is not in the tree or the record already is.
    pub fn insert(&mut self, record: Record, parent: &NodeKey, relation: &str) -> bool {
        let key = record.key();
        if self.positions.contains_key(&key) {
            return false;
        }
        let Some(parent_path) = self.positions.get(parent).cloned() else {
            log::debug!("Parent {} of {} not in structure; omitting from nested view", parent, key);
            return false;
        };

        let mut node = &mut self.root;
        for &index in &parent_path {
            node = &mut node.children[index];
        }
        node.children.push(StructureNode::leaf(record, Some(relation.to_string())));

        let mut path = parent_path;
        path.push(node.children.len() - 1);
        self.positions.insert(key, path);
        true
    }

    pub fn finish(self) -> StructureNode {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(tag: &str, id: i64) -> Record {
        Record::new(tag, id, serde_json::Map::new())
    }

    #[test]
    fn test_nested_insertion() {
        let mut builder = StructureBuilder::new(rec("orders", 1));
        assert!(builder.insert(rec("work_orders", 10), &NodeKey::new("orders", 1), "work_orders.order_id"));
        assert!(builder.insert(rec("work_orders", 11), &NodeKey::new("orders", 1), "work_orders.order_id"));
        assert!(builder.insert(rec("parts", 200), &NodeKey::new("work_orders", 11), "parts.work_order_id"));
        assert!(builder.insert(rec("parts", 100), &NodeKey::new("work_orders", 10), "parts.work_order_id"));

        let tree = builder.finish();
        assert_eq!(tree.len(), 5);
        let wo11 = tree.child(&NodeKey::new("work_orders", 11)).unwrap();
        assert_eq!(wo11.children.len(), 1);
        assert_eq!(wo11.children[0].relation.as_deref(), Some("parts.work_order_id"));
        assert!(tree.find(&NodeKey::new("parts", 100)).is_some());
        assert!(tree.relation.is_none());
    }

    #[test]
    fn test_unknown_parent_is_omitted() {
        let mut builder = StructureBuilder::new(rec("orders", 1));
        assert!(!builder.insert(rec("parts", 100), &NodeKey::new("work_orders", 99), "parts.work_order_id"));
        let tree = builder.finish();
        assert!(tree.children.is_empty());
        assert!(tree.find(&NodeKey::new("parts", 100)).is_none());
    }

    #[test]
    fn test_duplicate_child_is_ignored() {
        let mut builder = StructureBuilder::new(rec("orders", 1));
        assert!(builder.insert(rec("work_orders", 10), &NodeKey::new("orders", 1), "r"));
        assert!(!builder.insert(rec("work_orders", 10), &NodeKey::new("orders", 1), "r"));
        assert_eq!(builder.finish().children.len(), 1);
    }
}
