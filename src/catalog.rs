//! Schema Lookup Tables
//!
//! Attribute value types and relation role names, read once per run from a
//! catalog file exported from the live schema. Both tables are read-only
//! once built.

use crate::error::LoadError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// Value Types
// ============================================================================

/// Declared primitive kind of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum AttributeValueType {
    Integer,
    Real,
    Text,
    Boolean,
    DateTime,
}

impl AttributeValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeValueType::Integer => "integer",
            AttributeValueType::Real => "real",
            AttributeValueType::Text => "text",
            AttributeValueType::Boolean => "boolean",
            AttributeValueType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for AttributeValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeValueType {
    type Err = String;

    /// Accepts both TypeDB 2.x (`LONG`, `DOUBLE`, `STRING`) and 3.x
    /// (`integer`, `double`, `string`) spellings.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" | "integer" | "int" => Ok(AttributeValueType::Integer),
            "double" | "real" | "float" | "decimal" => Ok(AttributeValueType::Real),
            "string" | "text" => Ok(AttributeValueType::Text),
            "boolean" | "bool" => Ok(AttributeValueType::Boolean),
            "datetime" | "date" => Ok(AttributeValueType::DateTime),
            other => Err(format!("unknown attribute value type `{}`", other)),
        }
    }
}

impl TryFrom<String> for AttributeValueType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Catalogs
// ============================================================================

/// Attribute name -> value type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct AttributeTypeCatalog {
    types: HashMap<String, AttributeValueType>,
}

impl AttributeTypeCatalog {
    pub fn new(types: HashMap<String, AttributeValueType>) -> Self {
        Self { types }
    }

    pub fn value_type(&self, attribute: &str) -> Option<AttributeValueType> {
        self.types.get(attribute).copied()
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.types.contains_key(attribute)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

impl FromIterator<(String, AttributeValueType)> for AttributeTypeCatalog {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValueType)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Relation type name -> role names, in declaration order
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RelationRoleCatalog {
    roles: HashMap<String, Vec<String>>,
}

const START_MARKERS: [&str; 2] = ["has_", "has-"];
const END_MARKERS: [&str; 2] = ["is_", "is-"];

fn has_marker(role: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| role.starts_with(m))
}

/// How the two role-players of a relation type map onto its roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionPolicy {
    Directed { start_role: String, end_role: String },
    Undirected { role: String },
}

impl RelationRoleCatalog {
    #[cfg(test)]
    pub fn new(roles: HashMap<String, Vec<String>>) -> Self {
        Self { roles }
    }

    pub fn roles(&self, relation_type: &str) -> Option<&[String]> {
        self.roles.get(relation_type).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Resolve the direction policy of `relation_type` from its role names.
    ///
    /// `has_` roles are starts and `is_` roles are ends; `reversed` swaps the
    /// two. A relation type with a single unmarked role is undirected.
    pub fn direction(
        &self,
        relation_type: &str,
        reversed: bool,
    ) -> std::result::Result<DirectionPolicy, LoadError> {
        let roles = self
            .roles(relation_type)
            .filter(|roles| !roles.is_empty())
            .ok_or_else(|| {
                LoadError::config(relation_type, "relation type declares no roles in the catalog")
            })?;

        let start = roles.iter().find(|r| has_marker(r, &START_MARKERS));
        let end = roles.iter().find(|r| has_marker(r, &END_MARKERS));

        match (start, end) {
            (Some(start), Some(end)) => {
                let (start_role, end_role) = if reversed {
                    (end.clone(), start.clone())
                } else {
                    (start.clone(), end.clone())
                };
                Ok(DirectionPolicy::Directed { start_role, end_role })
            }
            (None, None) if roles.len() == 1 => Ok(DirectionPolicy::Undirected {
                role: roles[0].clone(),
            }),
            _ => Err(LoadError::config(
                relation_type,
                format!(
                    "roles [{}] need either a single role or both a `has_` and an `is_` role",
                    roles.join(", ")
                ),
            )),
        }
    }
}

// ============================================================================
// Catalog File
// ============================================================================

/// Both lookup tables, as exported from the schema
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub attributes: AttributeTypeCatalog,
    #[serde(default)]
    pub relations: RelationRoleCatalog,
}

impl SchemaCatalog {
    pub fn from_json(content: &str) -> Result<Self> {
        let catalog: SchemaCatalog =
            serde_json::from_str(content).context("Failed to parse schema catalog")?;

        // Each role may be listed once per relation.
        for (relation, roles) in &catalog.relations.roles {
            let unique: HashSet<&String> = roles.iter().collect();
            if unique.len() != roles.len() {
                anyhow::bail!("relation `{}` lists a role more than once", relation);
            }
        }

        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema catalog {:?}", path))?;
        Self::from_json(&content)
    }
}
