//! Entity insert statements: `insert $x isa <type>, has <attr> <value>, ...;`

use super::{bind_mappings, has_clause, ColumnMapping, InsertStatement};
use crate::catalog::AttributeTypeCatalog;
use crate::error::LoadError;
use crate::table::Table;

/// Build one insert statement per row of `table`, in row order.
///
/// Clauses whose cell is missing are left out of that row's statement.
pub fn build_entity_inserts(
    table: &Table,
    entity_type: &str,
    mappings: &[ColumnMapping],
    catalog: &AttributeTypeCatalog,
) -> Result<Vec<InsertStatement>, LoadError> {
    let bound = bind_mappings(entity_type, table, mappings, catalog)?;

    let mut statements = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let mut query = format!("insert $x isa {}", entity_type);
        for mapping in &bound {
            if let Some(clause) = has_clause(entity_type, table, row, mapping)? {
                query.push_str(", ");
                query.push_str(&clause);
            }
        }
        query.push(';');
        statements.push(InsertStatement::new(query));
    }

    Ok(statements)
}
