//! Write commands produced by a ready merge

use crate::catalog::SchemaCatalog;
use crate::error::Result;
use crate::merge::plan::MergePlan;
use crate::types::{EntityId, EntityTable, ReferenceColumn, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Extra `column = value` set alongside a repointed reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    /// Column in the referencing table
    pub column: String,
    /// Value written
    pub value: Value,
}

/// A single write against the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeCommand {
    /// Repoint rows of `location` from `from` to `to`
    UpdateReference {
        /// Reference column being rewritten
        location: ReferenceColumn,
        /// Losing entity
        from: EntityId,
        /// Surviving entity
        to: EntityId,
        /// Side-effect assignments applied to the same rows
        #[serde(skip_serializing_if = "Vec::is_empty")]
        assignments: Vec<Assignment>,
    },
    /// Delete rows of `location` referring to `from`
    DeleteRecord {
        /// Reference column selecting the rows
        location: ReferenceColumn,
        /// Losing entity
        from: EntityId,
    },
    /// Flag the losing entity as merged away
    MarkSuperseded {
        /// Losing entity
        entity: EntityId,
    },
}

impl std::fmt::Display for MergeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateReference {
                location,
                from,
                to,
                assignments,
            } => {
                write!(f, "update {location}: {from} -> {to}")?;
                for a in assignments {
                    write!(f, ", {} = {}", a.column, a.value)?;
                }
                Ok(())
            }
            Self::DeleteRecord { location, from } => write!(f, "delete {location} = {from}"),
            Self::MarkSuperseded { entity } => write!(f, "mark {entity} superseded"),
        }
    }
}

/// Ordered commands for one merge, applied as a single transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandBatch {
    /// Entity table the ids belong to
    pub entity: EntityTable,
    /// Surviving entity
    pub keep: EntityId,
    /// Entity merged away
    pub lose: EntityId,
    /// Updates, then deletes, then the supersede flag
    pub commands: Vec<MergeCommand>,
}

impl CommandBatch {
    /// Number of commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True for a batch with no commands (never produced by the engine)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Turn a ready plan into commands.
///
/// The root entity key is excluded from updates: repointing `table.key`
/// would rewrite the losing row's own id. Side-effect columns are checked
/// against the catalog before they are accepted.
pub fn build_commands(
    entity: &EntityTable,
    catalog: &SchemaCatalog,
    plan: &MergePlan,
    side_effects: &BTreeMap<String, BTreeMap<String, Value>>,
    keep: EntityId,
    lose: EntityId,
) -> Result<CommandBatch> {
    let root = entity.root_column();
    let mut commands = Vec::with_capacity(plan.update.len() + plan.delete.len() + 1);

    for location in plan.update.iter().filter(|l| l.key() != root) {
        let mut assignments = Vec::new();
        if let Some(columns) = side_effects.get(&location.table) {
            for (column, value) in columns {
                catalog.check_column(&location.table, column)?;
                assignments.push(Assignment {
                    column: column.clone(),
                    value: value.clone(),
                });
            }
        }
        commands.push(MergeCommand::UpdateReference {
            location: location.clone(),
            from: lose,
            to: keep,
            assignments,
        });
    }

    for location in plan.delete.iter().filter(|l| l.key() != root) {
        commands.push(MergeCommand::DeleteRecord {
            location: location.clone(),
            from: lose,
        });
    }

    commands.push(MergeCommand::MarkSuperseded { entity: lose });

    Ok(CommandBatch {
        entity: entity.clone(),
        keep,
        lose,
        commands,
    })
}
