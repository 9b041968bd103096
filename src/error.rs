use thiserror::Error;

/// Main error type for Scopegraph
#[derive(Error, Debug)]
pub enum ScopeGraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema introspection errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Traversal root cannot be resolved (unknown type, missing or invisible row)
    #[error("Invalid root: {0}")]
    InvalidRoot(String),

    /// The record store failed mid-traversal; partial results are discarded
    #[error("Fetch from {table} failed: {message}")]
    Fetch { table: String, message: String },

    /// Traversal observed a cancelled signal between depth layers
    #[error("Traversal cancelled")]
    Cancelled,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ScopeGraphError {
    pub(crate) fn fetch(table: &str, err: impl std::fmt::Display) -> Self {
        ScopeGraphError::Fetch {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}

/// Convenient Result type using ScopeGraphError
pub type Result<T> = std::result::Result<T, ScopeGraphError>;
