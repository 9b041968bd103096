use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;
use crate::config::SchemaConfig;
use crate::error::{Result, ScopeGraphError};
use crate::schema::{self, SchemaCatalog};

// WAL for concurrent readers, foreign keys on so introspected relations stay honest,
// 64MB page cache for wide closures.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536;";

/// Database connection wrapper for the backing record store
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with the service pragmas applied
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(ScopeGraphError::Database)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    ///
    /// Traversals are synchronous; running them here keeps them off the async runtime.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.open_connection()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            ScopeGraphError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("database task failed: {}", e),
            ))
        })?
    }

    /// Apply pending migrations (when the directory exists), then introspect the
    /// resulting schema into a frozen catalog.
    pub async fn prepare_catalog(&self, migrations_dir: &Path, config: &SchemaConfig) -> Result<SchemaCatalog> {
        let migrations_dir = migrations_dir.to_path_buf();
        let config = config.clone();
        self.with_connection(move |conn| {
            if migrations_dir.is_dir() {
                migrate::run_migrations(conn, &migrations_dir)?;
            } else {
                log::info!(
                    "No migrations directory at {}; using the existing schema",
                    migrations_dir.display()
                );
            }
            schema::introspect(conn, &config)
        })
        .await
    }
}

pub mod migrate;
