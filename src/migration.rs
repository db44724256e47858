//! Migration Run
//!
//! Loads every entity table, then every relation table, one table at a time.
//! Each table is fully generated before its first batch is committed, and all
//! entity tables are committed before any relation statement is generated so
//! that every role-player a relation matches already exists.

use crate::backend::Session;
use crate::catalog::SchemaCatalog;
use crate::committer::CommitReport;
use crate::error::LoadError;
use crate::loader::{BulkLoader, LoadOptions};
use crate::mapping::{derive_mappings, TableNaming};
use crate::query::{
    build_entity_inserts, build_relation_inserts, ColumnMapping, Endpoint, InsertStatement, RolePlayer,
};
use crate::table::Table;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Relation types of the offshore leaks dataset whose `is_` role is the start
pub const DEFAULT_REVERSED: [&str; 3] = ["intermediary_of", "officer_of", "underlying"];

/// Entity file stems of the offshore leaks dataset and their entity types
pub const DEFAULT_ALIASES: [(&str, &str); 5] = [
    ("addresses", "node_address"),
    ("entities", "org_entity"),
    ("intermediaries", "intermediary"),
    ("officers", "officer"),
    ("others", "other"),
];

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub entities_dir: PathBuf,
    pub relations_dir: PathBuf,
    /// Attribute that identifies a role-player
    pub id_attribute: String,
    pub start_column: String,
    pub end_column: String,
    /// Declared type of role-players; `None` matches any type
    pub player_type: Option<String>,
    /// Relation types whose `is_` role is the start
    pub reversed: HashSet<String>,
    /// File stem -> thing type
    pub aliases: HashMap<String, String>,
    pub load: LoadOptions,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            entities_dir: PathBuf::from("data/preprocessed/entities"),
            relations_dir: PathBuf::from("data/preprocessed/relations"),
            id_attribute: "id".to_string(),
            start_column: "_start".to_string(),
            end_column: "_end".to_string(),
            player_type: None,
            reversed: DEFAULT_REVERSED.iter().map(|r| r.to_string()).collect(),
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(stem, thing)| (stem.to_string(), thing.to_string()))
                .collect(),
            load: LoadOptions::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub tables: Vec<(String, CommitReport)>,
    pub elapsed: Duration,
}

impl MigrationSummary {
    pub fn statements(&self) -> usize {
        self.tables.iter().map(|(_, r)| r.statements).sum()
    }
}

pub struct Migration<S> {
    loader: BulkLoader<S>,
    catalog: SchemaCatalog,
    naming: TableNaming,
    config: MigrationConfig,
}

/// CSV files directly inside `dir`, sorted by name
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl<S> Migration<S>
where
    S: Session + 'static,
    S::Transaction: 'static,
{
    pub fn new(session: Arc<S>, catalog: SchemaCatalog, config: MigrationConfig) -> Result<Self> {
        let naming = TableNaming::new(config.aliases.clone())?;
        Ok(Self {
            loader: BulkLoader::new(session, config.load),
            catalog,
            naming,
            config,
        })
    }

    /// Statements for one entity table
    pub fn entity_statements(&self, thing: &str, table: &Table) -> Result<Vec<InsertStatement>, LoadError> {
        let mappings = derive_mappings(thing, table, &self.catalog.attributes, &[])?;
        if mappings.is_empty() {
            return Err(LoadError::config(thing, "no column maps to a schema attribute"));
        }
        build_entity_inserts(table, thing, &mappings, &self.catalog.attributes)
    }

    /// Statements for one relation table, its start and end columns matched
    /// on the identifying attribute.
    pub fn relation_statements(&self, thing: &str, table: &Table) -> Result<Vec<InsertStatement>, LoadError> {
        let attributes = &self.catalog.attributes;
        let excluded = [self.config.start_column.as_str(), self.config.end_column.as_str()];
        let relation_attributes = derive_mappings(thing, table, attributes, &excluded)?;

        let policy = self
            .catalog
            .relations
            .direction(thing, self.config.reversed.contains(thing))?;

        let player = |endpoint: Endpoint, variable: &str, column: &str| -> Result<RolePlayer, LoadError> {
            Ok(RolePlayer {
                endpoint,
                variable: variable.to_string(),
                player_type: self.config.player_type.clone(),
                identity: vec![ColumnMapping::resolve(
                    thing,
                    column,
                    self.config.id_attribute.as_str(),
                    attributes,
                )?],
            })
        };
        let players = vec![
            player(Endpoint::Start, "start", &self.config.start_column)?,
            player(Endpoint::End, "end", &self.config.end_column)?,
        ];
        let bindings = policy.bind(thing, players)?;

        build_relation_inserts(table, thing, &bindings, &relation_attributes, attributes)
    }

    async fn load_table(&self, path: &Path, relation: bool) -> Result<(String, CommitReport)> {
        let name = file_name(path);
        let thing = self.naming.thing_type(&name);
        let table = Table::from_csv_path(name.as_str(), path)?;
        let kind = if relation { "relation" } else { "entity" };

        info!("📝 Preparing {} insert queries for {} ({} rows)", kind, thing, table.len());
        let statements = if relation {
            self.relation_statements(&thing, &table)
        } else {
            self.entity_statements(&thing, &table)
        }
        .with_context(|| format!("Failed to prepare {} table {}", kind, name))?;

        info!("💾 Performing {} insert queries", thing);
        let report = self
            .loader
            .load(statements)
            .await
            .with_context(|| format!("Failed to insert {} table {}", kind, name))?;

        info!("✅ Done inserting {} {}s ({} statements)", thing, kind, report.statements);
        Ok((thing, report))
    }

    /// Load all entity tables, then all relation tables.
    pub async fn run(&self) -> Result<MigrationSummary> {
        let started = Instant::now();
        let mut summary = MigrationSummary::default();

        for path in csv_files(&self.config.entities_dir)? {
            summary.tables.push(self.load_table(&path, false).await?);
        }
        for path in csv_files(&self.config.relations_dir)? {
            summary.tables.push(self.load_table(&path, true).await?);
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}
