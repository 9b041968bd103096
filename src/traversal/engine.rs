use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use super::{ClosureResult, StructureBuilder, StructureNode, TraversalParams, VisitedSet};
use crate::error::{Result, ScopeGraphError};
use crate::fetch::{FetchOptions, Filter, RecordFetch};
use crate::schema::{NodeKey, Record, RecordId, RelationDescriptor, SchemaCatalog};
use crate::scope::Scope;

/// Traversal entry point, borrowing the frozen catalog and a record store.
pub struct Traversal<'a, F: RecordFetch + ?Sized> {
    catalog: &'a SchemaCatalog,
    store: &'a F,
}

/// How a record was reached: the parent that discovered it and the relation followed.
#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub parent: NodeKey,
    pub relation: String,
}

/// One batched fetch per key per layer. The parent type is part of the key so
/// identifier sets from different parent types are never merged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FetchKey {
    parent_type: String,
    target_type: String,
    relation: String,
}

struct Batch<'c> {
    descriptor: &'c RelationDescriptor,
    values: BTreeSet<RecordId>,
    /// link value, in display form, -> parents that asked for it. SQLite lets a
    /// TEXT column hold '1' for an INTEGER key, so both sides compare as text.
    origins: BTreeMap<String, Vec<NodeKey>>,
}

fn fetch_options(params: &TraversalParams) -> FetchOptions<'_> {
    FetchOptions {
        principal: params.principal.as_ref(),
        include_archived: params.include_archived,
    }
}

impl<'a, F: RecordFetch + ?Sized> Traversal<'a, F> {
    pub fn new(catalog: &'a SchemaCatalog, store: &'a F) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    pub fn store(&self) -> &'a F {
        self.store
    }

    /// Flat closure: every record reachable from `root` within the bounds.
    pub fn closure_of(&self, root: &NodeKey, params: &TraversalParams) -> Result<ClosureResult> {
        let mut scope = Scope::new();
        let depth_reached = self.walk(root, params, |record, _, _| {
            scope.insert(&record.tag, record.id.clone());
            ControlFlow::Continue(())
        })?;
        log::debug!("Closure of {}: {} records, depth {}", root, scope.len(), depth_reached);
        Ok(ClosureResult {
            root: root.clone(),
            depth_reached,
            scope,
        })
    }

    /// Nested view: each record under the parent that first discovered it.
    pub fn structure_of(&self, root: &NodeKey, params: &TraversalParams) -> Result<StructureNode> {
        let mut builder: Option<StructureBuilder> = None;
        self.walk(root, params, |record, via, _| {
            match via {
                None => builder = Some(StructureBuilder::new(record.clone())),
                Some(edge) => {
                    if let Some(builder) = builder.as_mut() {
                        builder.insert(record.clone(), &edge.parent, &edge.relation);
                    }
                }
            }
            ControlFlow::Continue(())
        })?;
        builder
            .map(StructureBuilder::finish)
            .ok_or_else(|| ScopeGraphError::InvalidRoot(root.to_string()))
    }

    /// First record, in breadth-first order, satisfying `predicate`. The root is tested too.
    pub fn find_first<P>(&self, root: &NodeKey, params: &TraversalParams, mut predicate: P) -> Result<Option<Record>>
    where
        P: FnMut(&Record) -> bool,
    {
        let mut found = None;
        self.walk(root, params, |record, _, _| {
            if predicate(record) {
                found = Some(record.clone());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Shared layer-at-a-time walk. Returns the deepest layer that yielded a record.
    fn walk<V>(&self, root: &NodeKey, params: &TraversalParams, mut visit: V) -> Result<usize>
    where
        V: FnMut(&Record, Option<&Edge>, usize) -> ControlFlow<()>,
    {
        self.warn_unknown_types(params);
        let root_record = self.resolve_root(root, params)?;

        let mut visited = VisitedSet::default();
        let mut frontier: Vec<(Record, Option<Edge>)> = vec![(root_record, None)];
        let mut depth = 0;
        let mut depth_reached = 0;

        while !frontier.is_empty() {
            let mut expanding = Vec::with_capacity(frontier.len());
            for (record, via) in frontier {
                if !visited.insert(&record.tag, &record.id) {
                    continue;
                }
                depth_reached = depth;
                if visit(&record, via.as_ref(), depth).is_break() {
                    log::debug!("Traversal from {} stopped at {} (depth {})", root, record.key(), depth);
                    return Ok(depth_reached);
                }
                expanding.push(record);
            }

            if params.max_depth.map_or(false, |max| depth >= max) {
                break;
            }
            if params.cancel.as_ref().map_or(false, |c| c.is_cancelled()) {
                log::debug!("Traversal from {} cancelled at depth {}", root, depth);
                return Err(ScopeGraphError::Cancelled);
            }

            frontier = self
                .expand(&expanding, params, &visited)?
                .into_iter()
                .map(|(record, edge)| (record, Some(edge)))
                .collect();
            depth += 1;
        }

        Ok(depth_reached)
    }

    /// Fetch the root itself; it must exist and be visible to the principal.
    pub(super) fn resolve_root(&self, root: &NodeKey, params: &TraversalParams) -> Result<Record> {
        let pk = self.catalog.primary_key(&root.tag).ok_or_else(|| {
            ScopeGraphError::InvalidRoot(format!("{} is not a keyed record type", root.tag))
        })?;
        let filter = Filter::is_in(pk, [root.id.clone()]);
        self.store
            .fetch(&root.tag, &filter, &fetch_options(params))?
            .into_iter()
            .find(|r| r.is(root))
            .ok_or_else(|| ScopeGraphError::InvalidRoot(format!("{} not found", root)))
    }

    /// Discover and fetch every unvisited neighbour of `nodes`, batched per fetch key.
    pub(super) fn expand(
        &self,
        nodes: &[Record],
        params: &TraversalParams,
        visited: &VisitedSet,
    ) -> Result<Vec<(Record, Edge)>> {
        let mut batches: BTreeMap<FetchKey, Batch<'a>> = BTreeMap::new();

        for node in nodes {
            for rel in self.catalog.relations_of(&node.tag) {
                if !params.direction.follows(rel.kind) || !self.admits(params, &rel.target) {
                    continue;
                }
                let Some(value) = node.field(&rel.source_field) else {
                    log::debug!(
                        "{} has no field {}; skipping relation {}",
                        node.key(),
                        rel.source_field,
                        rel.name
                    );
                    continue;
                };
                let Some(link) = RecordId::from_json(value) else {
                    continue;
                };
                let key = FetchKey {
                    parent_type: node.tag.clone(),
                    target_type: rel.target.clone(),
                    relation: rel.name.clone(),
                };
                let batch = batches.entry(key).or_insert_with(|| Batch {
                    descriptor: rel,
                    values: BTreeSet::new(),
                    origins: BTreeMap::new(),
                });
                batch.origins.entry(link.to_string()).or_default().push(node.key());
                batch.values.insert(link);
            }
        }

        let options = fetch_options(params);
        let mut next = Vec::new();
        for (key, batch) in batches {
            let link_field = &batch.descriptor.target_field;
            let filter = Filter::is_in(link_field.clone(), batch.values.iter().cloned());
            log::debug!(
                "Fetching {} from {} via {} ({} keys)",
                key.target_type,
                key.parent_type,
                key.relation,
                batch.origins.len()
            );

            for record in self.store.fetch(&key.target_type, &filter, &options)? {
                if record.tag != key.target_type || visited.contains(&record.tag, &record.id) {
                    continue;
                }
                let parent = record
                    .field(link_field)
                    .and_then(RecordId::from_json)
                    .and_then(|link| batch.origins.get(&link.to_string()))
                    .and_then(|parents| parents.first());
                match parent {
                    Some(parent) => {
                        let edge = Edge {
                            parent: parent.clone(),
                            relation: key.relation.clone(),
                        };
                        next.push((record, edge));
                    }
                    None => log::warn!(
                        "{} fetched via {} matches no {} parent on {}; dropped",
                        record.key(),
                        key.relation,
                        key.parent_type,
                        link_field
                    ),
                }
            }
        }
        Ok(next)
    }

    /// Target type must be traversable, pass the include list, and not be excluded.
    fn admits(&self, params: &TraversalParams, tag: &str) -> bool {
        self.catalog.is_traversable(tag)
            && params.include_types.as_ref().map_or(true, |include| include.contains(tag))
            && !params.exclude_types.contains(tag)
    }

    pub(super) fn warn_unknown_types(&self, params: &TraversalParams) {
        let named = params.include_types.iter().flatten().chain(params.exclude_types.iter());
        for tag in named {
            if !self.catalog.contains(tag) {
                log::warn!("Type filter names unknown type {}; it matches nothing", tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::fetch::{ColumnPolicy, FetchCall, MemoryStore, Principal, SqliteRecordStore};
    use crate::schema::{introspect, Direction};
    use crate::testing::{manufacturing_catalog, manufacturing_store, seeded_connection};
    use crate::traversal::Cancellation;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn ids(scope: &Scope, tag: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = scope
            .ids(tag)
            .map(|set| {
                set.iter()
                    .map(|id| match id {
                        RecordId::Int(i) => *i,
                        RecordId::Text(t) => panic!("unexpected text id {}", t),
                    })
                    .collect()
            })
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_order_closure_down() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();

        assert_eq!(ids(&result.scope, "orders"), vec![1]);
        assert_eq!(ids(&result.scope, "work_orders"), vec![10, 11]);
        assert_eq!(ids(&result.scope, "parts"), vec![100, 101, 200]);
        assert_eq!(result.scope.types().collect::<Vec<_>>(), vec!["orders", "work_orders", "parts"]);
        assert_eq!(result.scope.nodes().next(), Some(NodeKey::new("orders", 1)));
        assert_eq!(result.depth_reached, 2);
        assert!(!result.scope.contains(&NodeKey::new("work_orders", 12)));
    }

    #[test]
    fn test_one_fetch_per_relation_kind_per_layer() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();

        let calls = store.calls();
        // root lookup, orders -> work_orders, work_orders -> parts
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[2],
            FetchCall {
                table: "parts".to_string(),
                filter: Filter::is_in("work_order_id", [RecordId::Int(10), RecordId::Int(11)]),
            }
        );
    }

    #[test]
    fn test_depth_bounds() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);
        let root = NodeKey::new("orders", 1);

        let zero = traversal.closure_of(&root, &TraversalParams::down().max_depth(0)).unwrap();
        assert_eq!(zero.scope.len(), 1);
        assert!(zero.scope.contains(&root));

        let one = traversal.closure_of(&root, &TraversalParams::down().max_depth(1)).unwrap();
        assert_eq!(ids(&one.scope, "work_orders"), vec![10, 11]);
        assert!(one.scope.ids("parts").is_none());
    }

    #[test]
    fn test_root_without_relations() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal.closure_of(&NodeKey::new("parts", 300), &TraversalParams::down()).unwrap();
        assert_eq!(result.scope.len(), 1);
        assert_eq!(result.depth_reached, 0);
    }

    #[test]
    fn test_up_direction() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal.closure_of(&NodeKey::new("parts", 100), &TraversalParams::up()).unwrap();
        assert_eq!(ids(&result.scope, "work_orders"), vec![10]);
        assert_eq!(ids(&result.scope, "orders"), vec![1]);
        assert_eq!(ids(&result.scope, "customers"), vec![7]);
        assert_eq!(result.scope.len(), 4);
    }

    #[test]
    fn test_cycle_terminates() {
        let catalog = SchemaCatalog::builder()
            .table("a", "id")
            .table("b", "id")
            .foreign_key("a", "b_id", "b", None)
            .foreign_key("b", "a_id", "a", None)
            .build();
        let mut store = MemoryStore::new();
        store.insert("a", 1, json!({"b_id": 1})).insert("b", 1, json!({"a_id": 1}));
        let traversal = Traversal::new(&catalog, &store);

        for params in [TraversalParams::up(), TraversalParams::down()] {
            let result = traversal.closure_of(&NodeKey::new("a", 1), &params).unwrap();
            assert_eq!(result.scope.len(), 2);
            assert_eq!(ids(&result.scope, "a"), vec![1]);
            assert_eq!(ids(&result.scope, "b"), vec![1]);
        }
    }

    #[test]
    fn test_fetch_keys_isolate_parent_types() {
        // notes.parent_id references both orders and work_orders; order 5 and
        // work order 6 sit in the same layer under project 1.
        let catalog = SchemaCatalog::builder()
            .table("projects", "id")
            .table("orders", "id")
            .table("work_orders", "id")
            .table("notes", "id")
            .foreign_key("orders", "project_id", "projects", None)
            .foreign_key("work_orders", "project_id", "projects", None)
            .foreign_key("notes", "parent_id", "orders", None)
            .foreign_key("notes", "parent_id", "work_orders", None)
            .build();
        let mut store = MemoryStore::new();
        store
            .insert("projects", 1, json!({}))
            .insert("orders", 5, json!({"project_id": 1}))
            .insert("work_orders", 6, json!({"project_id": 1}))
            .insert("notes", 900, json!({"parent_id": 5}))
            .insert("notes", 901, json!({"parent_id": 6}));
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal.closure_of(&NodeKey::new("projects", 1), &TraversalParams::down()).unwrap();
        assert_eq!(ids(&result.scope, "notes"), vec![900, 901]);

        let note_filters: Vec<Filter> = store
            .calls()
            .into_iter()
            .filter(|c| c.table == "notes")
            .map(|c| c.filter)
            .collect();
        assert_eq!(
            note_filters,
            vec![
                Filter::is_in("parent_id", [RecordId::Int(5)]),
                Filter::is_in("parent_id", [RecordId::Int(6)]),
            ]
        );
    }

    #[test]
    fn test_include_and_exclude_types() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);
        let root = NodeKey::new("orders", 1);

        let only_wo = traversal
            .closure_of(&root, &TraversalParams::down().include(["work_orders"]))
            .unwrap();
        assert_eq!(only_wo.scope.types().collect::<Vec<_>>(), vec!["orders", "work_orders"]);

        let excluded_wins = traversal
            .closure_of(
                &root,
                &TraversalParams::down().include(["work_orders", "parts"]).exclude(["work_orders"]),
            )
            .unwrap();
        assert_eq!(excluded_wins.scope.len(), 1);

        let no_parts = traversal
            .closure_of(&root, &TraversalParams::down().exclude(["parts"]))
            .unwrap();
        assert!(no_parts.scope.ids("parts").is_none());
        assert_eq!(ids(&no_parts.scope, "work_orders"), vec![10, 11]);
    }

    #[test]
    fn test_unknown_include_type_is_empty_match() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal
            .closure_of(&NodeKey::new("orders", 1), &TraversalParams::down().include(["invoices"]))
            .unwrap();
        assert_eq!(result.scope.len(), 1);

        let excluded_unknown = traversal
            .closure_of(&NodeKey::new("orders", 1), &TraversalParams::down().exclude(["invoices"]))
            .unwrap();
        assert_eq!(excluded_unknown.scope.len(), 6);
    }

    #[test]
    fn test_opaque_types_are_leaves() {
        let catalog = SchemaCatalog::builder()
            .table("orders", "id")
            .table("work_orders", "id")
            .foreign_key("work_orders", "order_id", "orders", None)
            .opaque("work_orders")
            .build();
        let mut store = MemoryStore::new();
        store.insert("orders", 1, json!({})).insert("work_orders", 10, json!({"order_id": 1}));
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();
        assert_eq!(result.scope.len(), 1);
    }

    #[test]
    fn test_invalid_root() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        let unknown_type = traversal.closure_of(&NodeKey::new("invoices", 1), &TraversalParams::down());
        assert!(matches!(unknown_type, Err(ScopeGraphError::InvalidRoot(_))));

        let missing = traversal.closure_of(&NodeKey::new("orders", 999), &TraversalParams::down());
        assert!(matches!(missing, Err(ScopeGraphError::InvalidRoot(_))));
    }

    #[test]
    fn test_fetch_failure_aborts_whole_call() {
        let catalog = manufacturing_catalog();
        let mut store = manufacturing_store();
        store.fail_table("parts");
        let traversal = Traversal::new(&catalog, &store);

        let result = traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down());
        assert!(matches!(result, Err(ScopeGraphError::Fetch { ref table, .. }) if table == "parts"));

        // shallow enough never to touch parts
        let shallow = traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down().max_depth(1));
        assert!(shallow.is_ok());
    }

    #[test]
    fn test_cancellation_polled_per_layer() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);
        let cancel = Cancellation::new();
        cancel.cancel();

        let result = traversal.closure_of(
            &NodeKey::new("orders", 1),
            &TraversalParams::down().cancel_on(cancel.clone()),
        );
        assert!(matches!(result, Err(ScopeGraphError::Cancelled)));
        // the root lookup happened, no layer expansion did
        assert_eq!(store.calls().len(), 1);

        // depth-0 traversals finish before the first poll
        let rooted = traversal.closure_of(
            &NodeKey::new("orders", 1),
            &TraversalParams::down().max_depth(0).cancel_on(cancel),
        );
        assert!(rooted.is_ok());
    }

    #[test]
    fn test_principal_scoping() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store().with_policy(ColumnPolicy::new(
            "tenant_id",
            ["orders", "work_orders", "parts"].map(String::from),
        ));
        let traversal = Traversal::new(&catalog, &store);

        let acme = TraversalParams::down().principal(Principal::new("acme"));
        let result = traversal.closure_of(&NodeKey::new("orders", 1), &acme).unwrap();
        assert_eq!(ids(&result.scope, "work_orders"), vec![10]);
        assert_eq!(ids(&result.scope, "parts"), vec![100, 101]);

        let globex = TraversalParams::down().principal(Principal::new("globex"));
        let hidden_root = traversal.closure_of(&NodeKey::new("orders", 1), &globex);
        assert!(matches!(hidden_root, Err(ScopeGraphError::InvalidRoot(_))));
    }

    #[test]
    fn test_archived_records_excluded_unless_requested() {
        let catalog = manufacturing_catalog();
        let mut store = manufacturing_store();
        store.insert("parts", 102, json!({"work_order_id": 10, "sku": "Z", "archived_at": "2026-03-01"}));
        let traversal = Traversal::new(&catalog, &store);
        let root = NodeKey::new("orders", 1);

        let live = traversal.closure_of(&root, &TraversalParams::down()).unwrap();
        assert_eq!(ids(&live.scope, "parts"), vec![100, 101, 200]);

        let all = traversal
            .closure_of(&root, &TraversalParams::down().include_archived(true))
            .unwrap();
        assert_eq!(ids(&all.scope, "parts"), vec![100, 101, 102, 200]);
    }

    #[test]
    fn test_missing_accessor_field_is_skipped() {
        let catalog = manufacturing_catalog();
        let mut store = manufacturing_store();
        // a work order row without the order_id column at all, and one with a null link
        store.insert("work_orders", 50, json!({"title": "detached"}));
        store.insert("work_orders", 51, json!({"order_id": null}));
        let traversal = Traversal::new(&catalog, &store);

        for id in [50, 51] {
            let result = traversal.closure_of(&NodeKey::new("work_orders", id), &TraversalParams::up()).unwrap();
            assert_eq!(result.scope.len(), 1);
        }
    }

    #[test]
    fn test_closure_is_idempotent() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);
        let root = NodeKey::new("customers", 7);

        let first = traversal.closure_of(&root, &TraversalParams::down()).unwrap();
        let second = traversal.closure_of(&root, &TraversalParams::down()).unwrap();
        assert_eq!(first, second);
        assert_eq!(ids(&first.scope, "orders"), vec![1, 2]);
        assert_eq!(first.scope.len(), 1 + 2 + 3 + 4);
    }

    #[test]
    fn test_structure_of() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        let tree = traversal.structure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();
        assert!(tree.record.is(&NodeKey::new("orders", 1)));
        assert_eq!(tree.children.len(), 2);

        let wo10 = tree.child(&NodeKey::new("work_orders", 10)).unwrap();
        assert_eq!(wo10.relation.as_deref(), Some("work_orders.order_id"));
        let parts: BTreeSet<NodeKey> = wo10.children.iter().map(StructureNode::key).collect();
        assert_eq!(
            parts,
            BTreeSet::from([NodeKey::new("parts", 100), NodeKey::new("parts", 101)])
        );
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_find_first() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);
        let root = NodeKey::new("orders", 1);

        let found = traversal
            .find_first(&root, &TraversalParams::down(), |r| r.field("sku") == Some(&json!("B")))
            .unwrap();
        assert_eq!(found.map(|r| r.key()), Some(NodeKey::new("parts", 101)));

        let none = traversal
            .find_first(&root, &TraversalParams::down(), |r| r.field("sku") == Some(&json!("D")))
            .unwrap();
        assert!(none.is_none());

        let itself = traversal
            .find_first(&root, &TraversalParams::down(), |r| r.tag == "orders")
            .unwrap();
        assert_eq!(itself.map(|r| r.key()), Some(root.clone()));
    }

    #[test]
    fn test_find_first_stops_early() {
        let catalog = manufacturing_catalog();
        let store = manufacturing_store();
        let traversal = Traversal::new(&catalog, &store);

        traversal
            .find_first(&NodeKey::new("orders", 1), &TraversalParams::down(), |r| r.tag == "work_orders")
            .unwrap();
        // root lookup + one layer; parts never fetched
        assert_eq!(store.calls().len(), 2);
    }

    #[test]
    fn test_sqlite_closure() {
        let conn = seeded_connection();
        let catalog = introspect(&conn, &SchemaConfig::default()).unwrap();
        let store = SqliteRecordStore::new(&conn, &catalog);
        let traversal = Traversal::new(&catalog, &store);

        let down = traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();
        assert_eq!(ids(&down.scope, "work_orders"), vec![10, 11]);
        assert_eq!(ids(&down.scope, "parts"), vec![100, 101, 200]);
        assert_eq!(ids(&down.scope, "part_specs"), vec![1]);
        assert_eq!(down.depth_reached, 3);

        let up = traversal.closure_of(&NodeKey::new("part_specs", 1), &TraversalParams::up()).unwrap();
        assert_eq!(ids(&up.scope, "customers"), vec![7]);
        assert_eq!(up.scope.len(), 5);
    }

    #[test]
    fn test_sqlite_closure_across_mixed_affinity_links() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY);
             CREATE TABLE work_orders (id INTEGER PRIMARY KEY, order_id TEXT REFERENCES orders(id));
             INSERT INTO orders VALUES (1);
             INSERT INTO work_orders VALUES (10, '1');
             INSERT INTO work_orders VALUES (11, 1);",
        )
        .unwrap();
        let catalog = introspect(&conn, &SchemaConfig::default()).unwrap();
        let store = SqliteRecordStore::new(&conn, &catalog);
        let traversal = Traversal::new(&catalog, &store);

        let down = traversal.closure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();
        assert_eq!(ids(&down.scope, "work_orders"), vec![10, 11]);

        let up = traversal.closure_of(&NodeKey::new("work_orders", 10), &TraversalParams::up()).unwrap();
        assert_eq!(ids(&up.scope, "orders"), vec![1]);

        let tree = traversal.structure_of(&NodeKey::new("orders", 1), &TraversalParams::down()).unwrap();
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn test_root_listed_first_in_self_referencing_table() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, manager_id INTEGER REFERENCES employees(id));
             INSERT INTO employees VALUES (1, NULL);
             INSERT INTO employees VALUES (3, 1);
             INSERT INTO employees VALUES (5, 3);",
        )
        .unwrap();
        let catalog = introspect(&conn, &SchemaConfig::default()).unwrap();
        let store = SqliteRecordStore::new(&conn, &catalog);
        let traversal = Traversal::new(&catalog, &store);

        let chain = traversal.closure_of(&NodeKey::new("employees", 5), &TraversalParams::up()).unwrap();
        let nodes: Vec<NodeKey> = chain.scope.nodes().collect();
        assert_eq!(
            nodes,
            vec![NodeKey::new("employees", 5), NodeKey::new("employees", 3), NodeKey::new("employees", 1)]
        );
    }

    #[test]
    fn test_direction_default_is_down() {
        assert_eq!(TraversalParams::default().direction, Direction::Down);
    }
}
