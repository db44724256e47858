pub mod entity;
pub mod relation;

pub use entity::build_entity_inserts;
pub use relation::{build_relation_inserts, Endpoint, RolePlayer};

use crate::catalog::{AttributeTypeCatalog, AttributeValueType};
use crate::error::LoadError;
use crate::table::Table;
use crate::value::Value;
use std::fmt;

/// One complete TypeQL write query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertStatement(String);

impl InsertStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source column -> target attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub column: String,
    pub attribute: String,
    pub value_type: AttributeValueType,
}

impl ColumnMapping {
    /// Build a mapping, taking the value type from the catalog. Attributes
    /// unknown to the catalog are rejected.
    pub fn resolve(
        thing: &str,
        column: impl Into<String>,
        attribute: impl Into<String>,
        catalog: &AttributeTypeCatalog,
    ) -> Result<Self, LoadError> {
        let attribute = attribute.into();
        let value_type = catalog.value_type(&attribute).ok_or_else(|| {
            LoadError::config(thing, format!("attribute `{}` is not in the schema", attribute))
        })?;
        Ok(Self {
            column: column.into(),
            attribute,
            value_type,
        })
    }
}

/// A mapping checked against a concrete table
pub(crate) struct BoundMapping<'a> {
    pub mapping: &'a ColumnMapping,
    pub index: usize,
}

/// Check `mappings` against the catalog and the table header before any row
/// is read.
pub(crate) fn bind_mappings<'a>(
    thing: &str,
    table: &Table,
    mappings: &'a [ColumnMapping],
    catalog: &AttributeTypeCatalog,
) -> Result<Vec<BoundMapping<'a>>, LoadError> {
    mappings
        .iter()
        .map(|mapping| {
            match catalog.value_type(&mapping.attribute) {
                None => {
                    return Err(LoadError::config(
                        thing,
                        format!("attribute `{}` is not in the schema", mapping.attribute),
                    ))
                }
                Some(t) if t != mapping.value_type => {
                    return Err(LoadError::config(
                        thing,
                        format!(
                            "attribute `{}` is declared {} but mapped as {}",
                            mapping.attribute, t, mapping.value_type
                        ),
                    ))
                }
                Some(_) => {}
            }
            let index = table.column_index(&mapping.column).ok_or_else(|| {
                LoadError::config(
                    thing,
                    format!("column `{}` is not in table `{}`", mapping.column, table.name),
                )
            })?;
            Ok(BoundMapping { mapping, index })
        })
        .collect()
}

/// Decode one cell and render `has <attr> <literal>`, or `None` when missing.
pub(crate) fn has_clause(
    thing: &str,
    table: &Table,
    row: usize,
    bound: &BoundMapping<'_>,
) -> Result<Option<String>, LoadError> {
    let raw = table.cell(row, bound.index);
    let value = Value::decode(raw, bound.mapping.value_type).map_err(|_| LoadError::Generation {
        thing: thing.to_string(),
        row,
        column: bound.mapping.column.clone(),
        value: raw.unwrap_or_default().to_string(),
        expected: bound.mapping.value_type.to_string(),
    })?;

    Ok(value.map(|v| format!("has {} {}", bound.mapping.attribute, v.to_literal())))
}
