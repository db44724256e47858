//! Table discovery helpers: thing types from file names, and column
//! mappings from table headers.

use crate::catalog::AttributeTypeCatalog;
use crate::error::LoadError;
use crate::query::ColumnMapping;
use crate::table::Table;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Export-tool decorations around the type name in data file names
const FILE_NAME_NOISE: &str = r"^relationships_|_?clean_formatted_?|^nodes-|\.csv$";

pub struct TableNaming {
    noise: Regex,
    aliases: HashMap<String, String>,
}

impl TableNaming {
    pub fn new(aliases: HashMap<String, String>) -> Result<Self> {
        let noise = Regex::new(FILE_NAME_NOISE).context("Failed to build file name regex")?;
        Ok(Self { noise, aliases })
    }

    /// `nodes-officers_clean_formatted.csv` -> `officers`, then through the
    /// alias table (`officers` -> `officer`).
    pub fn thing_type(&self, file_name: &str) -> String {
        let stem = self.noise.replace_all(file_name, "");
        match self.aliases.get(stem.as_ref()) {
            Some(alias) => alias.clone(),
            None => stem.into_owned(),
        }
    }
}

/// Attribute a column feeds: the column name minus one leading underscore.
pub fn attribute_for_column(column: &str) -> &str {
    column.strip_prefix('_').unwrap_or(column)
}

/// Map every column whose attribute is in the catalog, skipping `excluded`.
pub fn derive_mappings(
    thing: &str,
    table: &Table,
    catalog: &AttributeTypeCatalog,
    excluded: &[&str],
) -> Result<Vec<ColumnMapping>, LoadError> {
    let mut mappings = Vec::new();
    for column in &table.columns {
        if excluded.contains(&column.as_str()) {
            continue;
        }
        let attribute = attribute_for_column(column);
        if !catalog.contains(attribute) {
            debug!("Column `{}` of {} has no schema attribute, skipping", column, thing);
            continue;
        }
        mappings.push(ColumnMapping::resolve(thing, column.as_str(), attribute, catalog)?);
    }
    Ok(mappings)
}
