use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scopegraph: ScopegraphConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub attachables: Vec<AttachableConfig>,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScopegraphConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// Schema catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Tables that are cataloged but never traversed into (leaves).
    #[serde(default)]
    pub opaque_tables: Vec<String>,
    /// Tables left out of the catalog entirely.
    #[serde(default)]
    pub ignored_tables: Vec<String>,
    /// Display label overrides, keyed by table name.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Soft-delete marker column; rows with a non-null value are archived.
    #[serde(default = "default_archived_column")]
    pub archived_column: String,
    /// Column scoping rows to a principal id.
    #[serde(default)]
    pub principal_column: Option<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            opaque_tables: Vec::new(),
            ignored_tables: Vec::new(),
            labels: BTreeMap::new(),
            archived_column: default_archived_column(),
            principal_column: None,
        }
    }
}

/// Traversal defaults and limits
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalConfig {
    #[serde(default)]
    pub default_max_depth: Option<usize>,
    #[serde(default = "default_max_depth_limit")]
    pub max_depth_limit: usize,
    #[serde(default)]
    pub include_archived: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_max_depth: None,
            max_depth_limit: default_max_depth_limit(),
            include_archived: false,
        }
    }
}

impl TraversalConfig {
    /// Resolve a requested depth against the configured default and hard cap.
    pub fn effective_depth(&self, requested: Option<usize>) -> usize {
        requested
            .or(self.default_max_depth)
            .unwrap_or(self.max_depth_limit)
            .min(self.max_depth_limit)
    }
}

/// A polymorphically-owned table (documents, annotations, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct AttachableConfig {
    pub kind: String,
    pub table: String,
    #[serde(default = "default_owner_type_field")]
    pub owner_type_field: String,
    #[serde(default = "default_owner_id_field")]
    pub owner_id_field: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: Vec::new(),
            authless: false,
        }
    }
}

fn default_http_enabled() -> bool {
    true
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "SCOPEGRAPH_API_KEY".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_archived_column() -> String {
    "archived_at".to_string()
}

fn default_max_depth_limit() -> usize {
    32
}

fn default_owner_type_field() -> String {
    "owner_type".to_string()
}

fn default_owner_id_field() -> String {
    "owner_id".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in SCOPEGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SCOPEGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.traversal.max_depth_limit == 0 {
            anyhow::bail!("traversal.max_depth_limit must be greater than 0");
        }

        if let Some(default_depth) = self.traversal.default_max_depth {
            if default_depth > self.traversal.max_depth_limit {
                anyhow::bail!(
                    "traversal.default_max_depth ({}) must not exceed traversal.max_depth_limit ({})",
                    default_depth,
                    self.traversal.max_depth_limit
                );
            }
        }

        if self.schema.archived_column.trim().is_empty() {
            anyhow::bail!("schema.archived_column must not be empty");
        }

        let mut kinds = HashSet::new();
        for attachable in &self.attachables {
            if attachable.kind.trim().is_empty() || attachable.table.trim().is_empty() {
                anyhow::bail!("attachables entries need a non-empty kind and table");
            }
            if attachable.owner_type_field.trim().is_empty()
                || attachable.owner_id_field.trim().is_empty()
            {
                anyhow::bail!(
                    "attachable {} needs non-empty owner_type_field and owner_id_field",
                    attachable.kind
                );
            }
            if !kinds.insert(attachable.kind.as_str()) {
                anyhow::bail!("duplicate attachable kind: {}", attachable.kind);
            }
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.scopegraph.db_path
    }

    /// Get migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.scopegraph.migrations_dir
    }

    /// Look up an attachable table by kind
    pub fn attachable(&self, kind: &str) -> Option<&AttachableConfig> {
        self.attachables.iter().find(|a| a.kind == kind)
    }
}
