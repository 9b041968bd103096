use std::collections::{HashMap, HashSet};

use crate::schema::RecordId;

/// Per-call registry of records already expanded, keyed by type then id.
#[derive(Debug, Default)]
pub struct VisitedSet {
    by_type: HashMap<String, HashSet<RecordId>>,
}

impl VisitedSet {
    /// Record a node; `false` when it was already present.
    pub fn insert(&mut self, tag: &str, id: &RecordId) -> bool {
        match self.by_type.get_mut(tag) {
            Some(ids) => ids.insert(id.clone()),
            None => {
                self.by_type.insert(tag.to_string(), HashSet::from([id.clone()]));
                true
            }
        }
    }

    pub fn contains(&self, tag: &str, id: &RecordId) -> bool {
        self.by_type.get(tag).map_or(false, |ids| ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_once_per_type() {
        let mut visited = VisitedSet::default();
        assert!(visited.insert("orders", &RecordId::Int(1)));
        assert!(!visited.insert("orders", &RecordId::Int(1)));
        // same id, different type is a different record
        assert!(visited.insert("parts", &RecordId::Int(1)));
        assert!(visited.contains("parts", &RecordId::Int(1)));
        assert!(!visited.contains("work_orders", &RecordId::Int(1)));
    }
}
