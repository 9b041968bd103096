//! Operator CLI: run traversals against the configured database and print JSON.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use scopegraph::{
    db::Db,
    fetch::{policy_for, FetchOptions, SqliteRecordStore},
    http::types::TraversalRequest,
    schema::{Direction, NodeKey, Record, RecordId},
    scope::{count_by_type, fetch_attached, merge_scopes, subtract_scope},
    traversal::{PathStep, StructureNode},
    ClosureResult, Config, Principal, Scope, SchemaCatalog, ScopeGraphError, Traversal, TraversalParams,
};
use serde::Serialize;
use std::sync::Arc;

/// Inspect relational closures from the command line.
#[derive(Parser, Debug)]
#[command(name = "scopectl", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flat closure of a root, grouped by type.
    Closure {
        /// Root as type:id (e.g. orders:1).
        #[arg(value_parser = parse_node)]
        root: NodeKey,
        #[command(flatten)]
        opts: TraversalOpts,
    },
    /// Nested structure under a root.
    Tree {
        #[arg(value_parser = parse_node)]
        root: NodeKey,
        #[command(flatten)]
        opts: TraversalOpts,
    },
    /// First reachable record whose field equals a value.
    Find {
        #[arg(value_parser = parse_node)]
        root: NodeKey,
        /// Restrict matches to this type.
        #[arg(long = "type")]
        tag: Option<String>,
        #[arg(long)]
        field: String,
        #[arg(long)]
        equals: String,
        #[command(flatten)]
        opts: TraversalOpts,
    },
    /// Shortest relation chain between two records.
    Path {
        #[arg(value_parser = parse_node)]
        source: NodeKey,
        #[arg(value_parser = parse_node)]
        target: NodeKey,
        #[command(flatten)]
        opts: TraversalOpts,
    },
    /// Per-type counts over the union of several closures, minus others.
    Count {
        #[arg(value_parser = parse_node, required = true)]
        roots: Vec<NodeKey>,
        /// Subtract the closure of these roots.
        #[arg(long, value_parser = parse_node)]
        minus: Vec<NodeKey>,
        #[command(flatten)]
        opts: TraversalOpts,
    },
    /// Attachable records owned by anything in a root's closure.
    Attached {
        #[arg(value_parser = parse_node)]
        root: NodeKey,
        /// Attachable kind from config.toml.
        #[arg(long)]
        kind: String,
        #[command(flatten)]
        opts: TraversalOpts,
    },
    /// Relation descriptors and fingerprint.
    Schema,
}

#[derive(Args, Debug, Clone)]
struct TraversalOpts {
    /// Follow forward references instead of reverse ones.
    #[arg(long)]
    up: bool,
    #[arg(long)]
    depth: Option<usize>,
    #[arg(long)]
    include: Option<Vec<String>>,
    #[arg(long)]
    exclude: Vec<String>,
    /// Act as this principal.
    #[arg(long)]
    principal: Option<String>,
    #[arg(long)]
    archived: bool,
}

impl TraversalOpts {
    fn params(&self, root: &NodeKey, config: &Config) -> TraversalParams {
        let request = TraversalRequest {
            direction: if self.up { Direction::Up } else { Direction::Down },
            max_depth: self.depth,
            include_types: self.include.clone(),
            exclude_types: self.exclude.clone(),
            include_archived: self.archived.then_some(true),
            ..TraversalRequest::new(root.clone())
        };
        request.params(&config.traversal, self.principal.clone().map(Principal::new))
    }
}

fn parse_node(s: &str) -> Result<NodeKey, String> {
    let (tag, id) = s
        .split_once(':')
        .ok_or_else(|| format!("expected type:id, got '{}'", s))?;
    if tag.is_empty() || id.is_empty() {
        return Err(format!("expected type:id, got '{}'", s));
    }
    let id = id
        .parse::<i64>()
        .map(RecordId::Int)
        .unwrap_or_else(|_| RecordId::Text(id.to_string()));
    Ok(NodeKey::new(tag, id))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load()?);
    let db = Db::new(config.db_path());
    let catalog = Arc::new(
        db.prepare_catalog(config.migrations_dir(), &config.schema)
            .await
            .context("Failed to prepare schema catalog")?,
    );

    if let Command::Schema = cli.command {
        let relations: Vec<_> = catalog.descriptors().collect();
        return print_json(&serde_json::json!({
            "fingerprint": catalog.fingerprint(),
            "relations": relations,
        }));
    }

    let output = db
        .with_connection(move |conn| {
            let policy = policy_for(&config.schema, &catalog);
            let store = SqliteRecordStore::new(conn, &catalog)
                .with_policy(policy.as_ref())
                .with_archived_column(config.schema.archived_column.clone());
            run(cli.command, &config, &catalog, &store)
        })
        .await?;

    print_json(&output)
}

/// Whatever a subcommand produced, printed as JSON.
#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Closure(ClosureResult),
    Tree(StructureNode),
    Found(Option<Record>),
    Path(Option<Vec<PathStep>>),
    Counts(IndexMap<String, usize>),
    Records(Vec<Record>),
}

fn run(
    command: Command,
    config: &Config,
    catalog: &SchemaCatalog,
    store: &SqliteRecordStore<'_>,
) -> scopegraph::Result<Output> {
    let traversal = Traversal::new(catalog, store);

    let output = match command {
        Command::Closure { root, opts } => {
            Output::Closure(traversal.closure_of(&root, &opts.params(&root, config))?)
        }
        Command::Tree { root, opts } => {
            Output::Tree(traversal.structure_of(&root, &opts.params(&root, config))?)
        }
        Command::Find { root, tag, field, equals, opts } => {
            let found = traversal.find_first(&root, &opts.params(&root, config), |record| {
                tag.as_deref().map_or(true, |t| record.tag == t)
                    && record.field(&field).map_or(false, |v| match v {
                        serde_json::Value::String(s) => *s == equals,
                        other => other.to_string() == equals,
                    })
            })?;
            Output::Found(found)
        }
        Command::Path { source, target, opts } => {
            Output::Path(traversal.explain_path(&source, &target, &opts.params(&source, config))?)
        }
        Command::Count { roots, minus, opts } => {
            let included = closures(&traversal, &roots, &opts, config)?;
            let excluded = closures(&traversal, &minus, &opts, config)?;
            let scope = subtract_scope(
                &merge_scopes(&included.iter().collect::<Vec<_>>()),
                &merge_scopes(&excluded.iter().collect::<Vec<_>>()),
            );
            Output::Counts(count_by_type(&scope, catalog))
        }
        Command::Attached { root, kind, opts } => {
            let attachable = config.attachable(&kind).ok_or_else(|| {
                ScopeGraphError::InvalidInput(format!("no attachable kind '{}' configured", kind))
            })?;
            let params = opts.params(&root, config);
            let closure = traversal.closure_of(&root, &params)?;
            let options = FetchOptions {
                principal: params.principal.as_ref(),
                include_archived: params.include_archived,
            };
            Output::Records(fetch_attached(store, &closure.scope, attachable, &options)?)
        }
        Command::Schema => {
            return Err(ScopeGraphError::InvalidInput("schema is handled before connecting".to_string()))
        }
    };
    Ok(output)
}

fn closures(
    traversal: &Traversal<'_, SqliteRecordStore<'_>>,
    roots: &[NodeKey],
    opts: &TraversalOpts,
    config: &Config,
) -> scopegraph::Result<Vec<Scope>> {
    roots
        .iter()
        .map(|root| {
            traversal
                .closure_of(root, &opts.params(root, config))
                .map(|c| c.into_scope())
        })
        .collect()
}
