pub mod config;
pub mod error;
pub mod db;
pub mod cache;
pub mod schema;
pub mod fetch;
pub mod traversal;
pub mod scope;
pub mod http;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Result, ScopeGraphError};
pub use fetch::{Filter, Principal, RecordFetch, ScopePolicy};
pub use schema::{Direction, NodeKey, Record, RecordId, SchemaCatalog};
pub use scope::Scope;
pub use traversal::{Cancellation, ClosureResult, Traversal, TraversalParams};
