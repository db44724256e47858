//! Relation Insert Statements
//!
//! Each row becomes a match-insert query: the role-players are matched by
//! their identifying attributes, then a relation binding them to their roles
//! is inserted, optionally carrying its own attributes.
//!
//! ```text
//! match $start isa thing, has id 12; $end isa thing, has id 40;
//! insert (has_officer: $start, is_officer_of: $end) isa officer_of, has link 'director';
//! ```

use super::{bind_mappings, has_clause, BoundMapping, ColumnMapping, InsertStatement};
use crate::catalog::{AttributeTypeCatalog, DirectionPolicy};
use crate::error::LoadError;
use crate::table::Table;
use std::collections::HashSet;

/// Which end of a binary relation a role-player sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

/// A role-player whose role has not been resolved yet
#[derive(Debug, Clone)]
pub struct RolePlayer {
    pub endpoint: Endpoint,
    pub variable: String,
    /// `None` matches a player of any type
    pub player_type: Option<String>,
    pub identity: Vec<ColumnMapping>,
}

/// A role-player bound to a declared role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    pub role: String,
    pub variable: String,
    pub player_type: Option<String>,
    pub identity: Vec<ColumnMapping>,
}

impl RolePlayer {
    fn into_binding(self, role: &str) -> RoleBinding {
        RoleBinding {
            role: role.to_string(),
            variable: self.variable,
            player_type: self.player_type,
            identity: self.identity,
        }
    }
}

impl DirectionPolicy {
    /// Bind one start and one end player to their roles, start first.
    ///
    /// Directed relations give the start player the start role and the end
    /// player the end role; undirected relations give both the single role.
    /// Input order does not matter.
    pub fn bind(
        &self,
        relation_type: &str,
        players: Vec<RolePlayer>,
    ) -> Result<Vec<RoleBinding>, LoadError> {
        let mut start = None;
        let mut end = None;
        for player in players {
            let slot = match player.endpoint {
                Endpoint::Start => &mut start,
                Endpoint::End => &mut end,
            };
            if slot.is_some() {
                return Err(LoadError::config(
                    relation_type,
                    format!("more than one {:?} role player", player.endpoint),
                ));
            }
            *slot = Some(player);
        }

        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                return Err(LoadError::config(
                    relation_type,
                    "a start and an end role player are both required",
                ))
            }
        };

        let (start_role, end_role) = match self {
            DirectionPolicy::Directed { start_role, end_role } => (start_role, end_role),
            DirectionPolicy::Undirected { role } => (role, role),
        };

        Ok(vec![start.into_binding(start_role), end.into_binding(end_role)])
    }
}

fn is_valid_variable(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

struct BoundPlayer<'a> {
    binding: &'a RoleBinding,
    identity: Vec<BoundMapping<'a>>,
}

/// Build one match-insert statement per row of `table`, in row order.
pub fn build_relation_inserts(
    table: &Table,
    relation_type: &str,
    bindings: &[RoleBinding],
    relation_attributes: &[ColumnMapping],
    catalog: &AttributeTypeCatalog,
) -> Result<Vec<InsertStatement>, LoadError> {
    if bindings.len() < 2 {
        return Err(LoadError::config(
            relation_type,
            format!("needs at least two role players, got {}", bindings.len()),
        ));
    }

    let mut variables = HashSet::new();
    let mut players = Vec::with_capacity(bindings.len());
    for binding in bindings {
        if !is_valid_variable(&binding.variable) || binding.variable == "x" {
            return Err(LoadError::config(
                relation_type,
                format!("`{}` is not a usable variable name", binding.variable),
            ));
        }
        if !variables.insert(binding.variable.as_str()) {
            return Err(LoadError::config(
                relation_type,
                format!("variable ${} is bound twice", binding.variable),
            ));
        }
        if binding.identity.is_empty() {
            return Err(LoadError::config(
                relation_type,
                format!(
                    "role player ${} ({}) has no identifying attribute",
                    binding.variable, binding.role
                ),
            ));
        }
        players.push(BoundPlayer {
            binding,
            identity: bind_mappings(relation_type, table, &binding.identity, catalog)?,
        });
    }
    let attributes = bind_mappings(relation_type, table, relation_attributes, catalog)?;

    let role_list = bindings
        .iter()
        .map(|b| format!("{}: ${}", b.role, b.variable))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statements = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let mut patterns = Vec::with_capacity(players.len());
        for player in &players {
            let mut clauses = Vec::new();
            if let Some(player_type) = &player.binding.player_type {
                clauses.push(format!("isa {}", player_type));
            }
            let mut identified = false;
            for mapping in &player.identity {
                if let Some(clause) = has_clause(relation_type, table, row, mapping)? {
                    clauses.push(clause);
                    identified = true;
                }
            }
            if !identified {
                return Err(LoadError::Unmatchable {
                    thing: relation_type.to_string(),
                    row,
                    variable: player.binding.variable.clone(),
                });
            }
            patterns.push(format!("${} {}", player.binding.variable, clauses.join(", ")));
        }

        let mut query = format!(
            "match {}; insert ({}) isa {}",
            patterns.join("; "),
            role_list,
            relation_type
        );
        for mapping in &attributes {
            if let Some(clause) = has_clause(relation_type, table, row, mapping)? {
                query.push_str(", ");
                query.push_str(&clause);
            }
        }
        query.push(';');
        statements.push(InsertStatement::new(query));
    }

    Ok(statements)
}
