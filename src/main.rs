use anyhow::{Context, Result};
use scopegraph::db::{migrate, Db};
use scopegraph::http::ScopeServer;
use scopegraph::schema::RelationKind;
use scopegraph::{Config, SchemaCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; otherwise the configured level, otherwise info
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.scopegraph.log_level.as_str()),
    )
    .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server(config).await?,
        "verify" => run_schema_verification(config).await?,
        other => anyhow::bail!("Unknown command '{}'. Usage: scopegraph [serve|verify]", other),
    }

    Ok(())
}

/// Migrate, introspect and load the catalog every command works from
async fn load_catalog(config: &Config) -> Result<(Db, SchemaCatalog)> {
    log::info!("Database path: {}", config.db_path().display());
    let db = Db::new(config.db_path());
    let catalog = db
        .prepare_catalog(config.migrations_dir(), &config.schema)
        .await
        .context("Failed to prepare schema catalog")?;
    Ok((db, catalog))
}

/// Run the HTTP scope server
async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting Scopegraph HTTP Server v{}", env!("CARGO_PKG_VERSION"));

    if !config.http_server.enabled {
        anyhow::bail!("http_server.enabled is false in config.toml");
    }

    let (db, catalog) = load_catalog(&config).await?;
    log::info!("Schema fingerprint: {}", catalog.fingerprint());

    let port = config.http_server.port;
    let server = ScopeServer::new(db, catalog, config)?;
    server.run(port).await?;

    Ok(())
}

/// Apply migrations, introspect, and print what the engine will traverse
async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting Scopegraph v{}", env!("CARGO_PKG_VERSION"));

    let (db, catalog) = load_catalog(&config).await?;

    let applied = db
        .with_connection(|conn| {
            let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            if integrity != "ok" {
                return Err(scopegraph::ScopeGraphError::Schema(format!(
                    "Database integrity check failed: {}",
                    integrity
                )));
            }
            migrate::get_applied_migrations(conn)
        })
        .await?;
    log::info!("✓ Database integrity: OK ({} migrations applied)", applied.len());

    for attachable in &config.attachables {
        let Some(table) = catalog.table(&attachable.table) else {
            anyhow::bail!("Attachable {} points at unknown table {}", attachable.kind, attachable.table);
        };
        for field in [&attachable.owner_type_field, &attachable.owner_id_field] {
            if !table.has_column(field) {
                anyhow::bail!("Attachable {}: table {} has no column {}", attachable.kind, table.name, field);
            }
        }
        log::debug!("✓ Attachable {} -> {}", attachable.kind, table.name);
    }

    println!("Schema fingerprint: {}", catalog.fingerprint());
    for table in catalog.tables() {
        let marker = if catalog.is_traversable(&table.name) { " " } else { "~" };
        println!("{} {} ({})", marker, table.name, catalog.label(&table.name));
        for rel in catalog.relations_of(&table.name) {
            let arrow = match rel.kind {
                RelationKind::Forward => "->",
                RelationKind::Reverse => "<-",
            };
            let cardinality = if rel.many { "many" } else { "one" };
            println!("    {} {} via {} ({})", arrow, rel.target, rel.name, cardinality);
        }
    }

    log::info!("✓ Schema verification complete");
    Ok(())
}
