//! Shared fixtures for unit tests: a small manufacturing hierarchy, in memory and in SQLite.
//!
//! customer 7
//! ├── order 1 (acme)
//! │   ├── work order 10 (acme): parts 100, 101
//! │   └── work order 11 (globex): part 200
//! └── order 2 (acme)
//!     └── work order 12 (acme): part 300
//!
//! Documents hang off orders, work orders and parts through (owner_type, owner_id).

use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

use crate::db::{migrate, Db};
use crate::fetch::MemoryStore;
use crate::schema::SchemaCatalog;

pub(crate) fn manufacturing_catalog() -> SchemaCatalog {
    SchemaCatalog::builder()
        .table("customers", "id")
        .table("orders", "id")
        .table("work_orders", "id")
        .table("parts", "id")
        .table("documents", "id")
        .columns("orders", &["tenant_id", "archived_at"])
        .columns("work_orders", &["tenant_id", "archived_at"])
        .columns("parts", &["tenant_id", "archived_at", "sku"])
        .columns("documents", &["owner_type", "owner_id", "title"])
        .foreign_key("orders", "customer_id", "customers", None)
        .foreign_key("work_orders", "order_id", "orders", None)
        .foreign_key("parts", "work_order_id", "work_orders", None)
        .opaque("documents")
        .build()
}

pub(crate) fn manufacturing_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .insert("customers", 7, json!({"name": "Initech"}))
        .insert("orders", 1, json!({"customer_id": 7, "tenant_id": "acme"}))
        .insert("orders", 2, json!({"customer_id": 7, "tenant_id": "acme"}))
        .insert("work_orders", 10, json!({"order_id": 1, "tenant_id": "acme"}))
        .insert("work_orders", 11, json!({"order_id": 1, "tenant_id": "globex"}))
        .insert("work_orders", 12, json!({"order_id": 2, "tenant_id": "acme"}))
        .insert("parts", 100, json!({"work_order_id": 10, "sku": "A", "tenant_id": "acme"}))
        .insert("parts", 101, json!({"work_order_id": 10, "sku": "B", "tenant_id": "acme"}))
        .insert("parts", 200, json!({"work_order_id": 11, "sku": "C", "tenant_id": "globex"}))
        .insert("parts", 300, json!({"work_order_id": 12, "sku": "D", "tenant_id": "acme"}))
        .insert("documents", 1, json!({"owner_type": "orders", "owner_id": 1, "title": "PO"}))
        .insert("documents", 2, json!({"owner_type": "work_orders", "owner_id": 10, "title": "Traveler"}))
        .insert("documents", 3, json!({"owner_type": "parts", "owner_id": 200, "title": "Drawing"}))
        .insert("documents", 4, json!({"owner_type": "orders", "owner_id": 2, "title": "Other PO"}))
        .insert("documents", 5, json!({"owner_type": "customers", "owner_id": 10, "title": "Contract"}));
    store
}

const SEED_SQL: &str = r#"
INSERT INTO customers (id, name, tenant_id) VALUES (7, 'Initech', 'acme');
INSERT INTO orders (id, reference, customer_id, tenant_id) VALUES
    (1, 'SO-1', 7, 'acme'),
    (2, 'SO-2', 7, 'acme');
INSERT INTO work_orders (id, order_id, title, tenant_id) VALUES
    (10, 1, 'Machining', 'acme'),
    (11, 1, 'Assembly', 'globex'),
    (12, 2, 'Paint', 'acme');
INSERT INTO parts (id, work_order_id, sku, tenant_id) VALUES
    (100, 10, 'A', 'acme'),
    (101, 10, 'B', 'acme'),
    (200, 11, 'C', 'globex'),
    (300, 12, 'D', 'acme');
INSERT INTO part_specs (id, part_id, revision) VALUES (1, 100, 'r2');
INSERT INTO documents (id, owner_type, owner_id, title, tenant_id) VALUES
    (1, 'orders', 1, 'PO', 'acme'),
    (2, 'work_orders', 10, 'Traveler', 'acme'),
    (3, 'parts', 200, 'Drawing', 'globex'),
    (4, 'orders', 2, 'Other PO', 'acme'),
    (5, 'customers', 10, 'Contract', 'acme');
"#;

fn bundled_migrations() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

/// In-memory connection with the bundled migrations applied and the hierarchy seeded.
pub(crate) fn seeded_connection() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    migrate::run_migrations(&mut conn, &bundled_migrations()).unwrap();
    conn.execute_batch(SEED_SQL).unwrap();
    conn
}

/// File-backed database for code that goes through [`Db`]. Keep the `TempDir` alive.
pub(crate) fn seeded_db() -> (TempDir, Db) {
    let dir = TempDir::new().unwrap();
    let db = Db::new(dir.path().join("scopegraph.db"));
    let mut conn = db.open_connection().unwrap();
    migrate::run_migrations(&mut conn, &bundled_migrations()).unwrap();
    conn.execute_batch(SEED_SQL).unwrap();
    (dir, db)
}
