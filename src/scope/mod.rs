//! Closure sets and what can be done with them: set algebra, per-type counts,
//! and the bridge to polymorphically-owned ("attachable") records.

mod algebra;
mod attachments;

pub use algebra::{count_by_type, merge_scopes, subtract_scope};
pub use attachments::{fetch_attached, fetch_members, owner_filter};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::schema::{NodeKey, RecordId};

/// Type tag -> identifier set. Types and ids keep first-insertion order, so a
/// closure lists its root first. No type ever maps to an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scope {
    members: IndexMap<String, IndexSet<RecordId>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record; `false` when it was already a member.
    pub fn insert(&mut self, tag: &str, id: RecordId) -> bool {
        if let Some(ids) = self.members.get_mut(tag) {
            ids.insert(id)
        } else {
            self.members.insert(tag.to_string(), IndexSet::from([id]));
            true
        }
    }

    /// Union a whole identifier set into one type; empty sets are ignored.
    pub(crate) fn extend_type(&mut self, tag: &str, ids: impl IntoIterator<Item = RecordId>) {
        let mut ids = ids.into_iter().peekable();
        if ids.peek().is_none() {
            return;
        }
        self.members.entry(tag.to_string()).or_default().extend(ids);
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.members.get(&key.tag).map_or(false, |ids| ids.contains(&key.id))
    }

    pub fn ids(&self, tag: &str) -> Option<&IndexSet<RecordId>> {
        self.members.get(tag)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<RecordId>)> {
        self.members.iter().map(|(tag, ids)| (tag.as_str(), ids))
    }

    /// Every member as a [`NodeKey`], in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.members
            .iter()
            .flat_map(|(tag, ids)| ids.iter().map(move |id| NodeKey::new(tag.clone(), id.clone())))
    }

    /// Total number of records across all types.
    pub fn len(&self) -> usize {
        self.members.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<NodeKey> for Scope {
    fn from_iter<I: IntoIterator<Item = NodeKey>>(iter: I) -> Self {
        let mut scope = Scope::new();
        for key in iter {
            scope.insert(&key.tag, key.id);
        }
        scope
    }
}
