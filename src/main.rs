mod backend;
mod batch;
mod catalog;
mod committer;
mod error;
mod loader;
mod mapping;
mod migration;
mod query;
mod table;
mod value;

use anyhow::{Context, Result};
use backend::{ScriptSession, Session, TypeDbClient};
use catalog::SchemaCatalog;
use clap::{Parser, ValueEnum};
use loader::LoadOptions;
use migration::{Migration, MigrationConfig, MigrationSummary};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Write to a TypeDB server over HTTP
    Typedb,
    /// Write committed batches to a TypeQL script file
    Script,
}

/// Define a TypeDB schema and bulk-insert CSV tables into it.
#[derive(Debug, Parser)]
#[command(name = "typeql-bulk-loader", version)]
struct Config {
    /// Server host address
    #[arg(short = 'a', long, env = "TYPEDB_HOST", default_value = "localhost")]
    host: String,

    /// Server HTTP port
    #[arg(short = 'p', long, env = "TYPEDB_PORT", default_value_t = 8000)]
    port: u16,

    #[arg(long, env = "TYPEDB_USERNAME", default_value = "admin")]
    username: String,

    #[arg(long, env = "TYPEDB_PASSWORD", default_value = "password", hide_env_values = true)]
    password: String,

    /// Database name
    #[arg(short = 'd', long, env = "TYPEDB_DATABASE", default_value = "offshoreleaks")]
    database: String,

    /// Number of concurrent commit workers
    #[arg(short = 'n', long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    num_threads: u16,

    /// Number of queries made per commit
    #[arg(short = 'c', long, default_value = "250")]
    batch_size: NonZeroUsize,

    /// Write to the database even if it already exists
    #[arg(short = 'e', long)]
    existing: bool,

    /// Delete an existing database of this name and start anew
    #[arg(short = 'f', long)]
    force: bool,

    /// TypeQL define file applied before loading
    #[arg(long, env = "TYPEDB_SCHEMA_FILE")]
    schema: Option<PathBuf>,

    /// JSON export of attribute value types and relation roles
    #[arg(long, env = "TYPEDB_SCHEMA_CATALOG", default_value = "schema_catalog.json")]
    catalog: PathBuf,

    #[arg(long, default_value = "data/preprocessed/entities")]
    entities_dir: PathBuf,

    #[arg(long, default_value = "data/preprocessed/relations")]
    relations_dir: PathBuf,

    /// Attribute that uniquely identifies a role player
    #[arg(long, default_value = "id")]
    id_attribute: String,

    #[arg(long, default_value = "_start")]
    start_column: String,

    #[arg(long, default_value = "_end")]
    end_column: String,

    /// Declared type of role players (omit to match any type)
    #[arg(long)]
    player_type: Option<String>,

    /// Relation type whose `is_` role is the start of the relation
    #[arg(
        long = "reverse",
        value_name = "RELATION",
        default_values = ["intermediary_of", "officer_of", "underlying"]
    )]
    reversed: Vec<String>,

    /// Map a data file stem to a thing type
    #[arg(
        long = "alias",
        value_name = "STEM=TYPE",
        value_parser = parse_alias,
        default_values = [
            "addresses=node_address",
            "entities=org_entity",
            "intermediaries=intermediary",
            "officers=officer",
            "others=other",
        ]
    )]
    aliases: Vec<(String, String)>,

    /// Stop dispatching batches after the first failure
    #[arg(long)]
    fail_fast: bool,

    #[arg(long, value_enum, default_value_t = BackendKind::Typedb)]
    backend: BackendKind,

    /// Output of the script backend
    #[arg(long, default_value = "load.tql")]
    script_out: PathBuf,

    #[arg(long, default_value_t = 4)]
    connect_retries: u32,
}

fn parse_alias(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((stem, thing)) if !stem.is_empty() && !thing.is_empty() => {
            Ok((stem.to_string(), thing.to_string()))
        }
        _ => Err(format!("expected STEM=TYPE, got `{}`", raw)),
    }
}

impl Config {
    fn load() -> Self {
        dotenv::dotenv().ok();
        Config::parse()
    }

    fn typedb_url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    fn migration(&self) -> MigrationConfig {
        MigrationConfig {
            entities_dir: self.entities_dir.clone(),
            relations_dir: self.relations_dir.clone(),
            id_attribute: self.id_attribute.clone(),
            start_column: self.start_column.clone(),
            end_column: self.end_column.clone(),
            player_type: self.player_type.clone(),
            reversed: self.reversed.iter().cloned().collect(),
            aliases: self.aliases.iter().cloned().collect(),
            load: LoadOptions {
                batch_size: self.batch_size,
                num_workers: self.num_threads as usize,
                fail_fast: self.fail_fast,
            },
        }
    }
}

/// Wait before retry `attempt` (1-based): 1s, 2s, 4s, 8s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Sign in to TypeDB with exponential backoff retry logic
async fn connect_typedb_with_retry(
    url: &str,
    username: &str,
    password: &str,
    max_retries: u32,
) -> Result<TypeDbClient> {
    let max_retries = max_retries.max(1);

    for attempt in 1..=max_retries {
        info!("🔄 Attempting to connect to TypeDB at {}... (attempt {}/{})", url, attempt, max_retries);

        match TypeDbClient::connect(url, username, password).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                if attempt < max_retries {
                    let wait_time = backoff_delay(attempt);
                    warn!("⚠️  Failed to connect to TypeDB: {}. Retrying in {}s (attempt {}/{})...",
                          e, wait_time.as_secs(), attempt, max_retries);
                    tokio::time::sleep(wait_time).await;
                } else {
                    error!("❌ Failed to connect to TypeDB after {} attempts: {}", max_retries, e);
                    return Err(anyhow::anyhow!("TypeDB connection failed after {} retries: {}", max_retries, e));
                }
            }
        }
    }

    Err(anyhow::anyhow!("Failed to connect to TypeDB"))
}

/// Create the target database, honouring `--existing` and `--force`.
async fn prepare_database(client: &TypeDbClient, name: &str, existing: bool, force: bool) -> Result<()> {
    if force && client.database_exists(name).await? {
        client.delete_database(name).await?;
    }

    if client.database_exists(name).await? {
        if !existing {
            anyhow::bail!(
                "database {} already exists. Use --existing to write into existing database or --force to delete it and start anew.",
                name
            );
        }
        info!("📂 Writing into existing database {}", name);
    } else {
        client.create_database(name).await?;
    }
    Ok(())
}

async fn run_migration<S>(session: Arc<S>, catalog: SchemaCatalog, config: MigrationConfig) -> Result<MigrationSummary>
where
    S: Session + 'static,
    S::Transaction: 'static,
{
    Migration::new(session, catalog, config)?.run().await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::load();
    info!("🚀 Bulk loader starting (database={}, backend={:?})", config.database, config.backend);

    let catalog = SchemaCatalog::from_path(&config.catalog)?;
    info!(
        "📚 Loaded schema catalog: {} attributes, {} relation types",
        catalog.attributes.len(),
        catalog.relations.len()
    );

    let summary = match config.backend {
        BackendKind::Typedb => {
            let client = connect_typedb_with_retry(
                &config.typedb_url(),
                &config.username,
                &config.password,
                config.connect_retries,
            )
            .await?;

            prepare_database(&client, &config.database, config.existing, config.force).await?;

            if let Some(schema_path) = &config.schema {
                let schema = std::fs::read_to_string(schema_path)
                    .with_context(|| format!("Failed to read schema file {:?}", schema_path))?;
                client
                    .define_schema(&config.database, &schema)
                    .await
                    .context("Failed to define schema")?;
            }

            let session = Arc::new(client.session(&config.database));
            run_migration(session, catalog, config.migration()).await
        }
        BackendKind::Script => {
            let session = Arc::new(ScriptSession::create(config.database.as_str(), &config.script_out).await?);
            let summary = run_migration(session.clone(), catalog, config.migration()).await;
            info!("📄 Wrote {} batches to {:?}", session.commits(), config.script_out);
            summary
        }
    };

    match summary {
        Ok(summary) => {
            info!(
                "👋 Loaded {} statements from {} tables. Elapsed time: {:.1} seconds.",
                summary.statements(),
                summary.tables.len(),
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Load failed: {:?}", e);
            Err(e)
        }
    }
}



#[cfg(test)]
mod pipeline_tests;
