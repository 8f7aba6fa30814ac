//! Field-level comparison of examined record pairs

use crate::catalog::SchemaCatalog;
use crate::error::{Error, Result};
use crate::policy::{BehaviorTable, ColumnBehavior};
use crate::store::RowStore;
use crate::types::{EntityId, ReferenceColumn, Row, Value};
use serde::Serialize;
use tracing::debug;

/// One column of an examined pair, with the verdict of its behavior
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnComparison {
    /// Column name
    pub column: String,
    /// Behavior applied
    pub behavior: ColumnBehavior,
    /// Value on the surviving record
    pub kept: Value,
    /// Value on the record being merged away
    pub lost: Value,
    /// Whether the difference blocks the merge
    pub blocks: bool,
}

/// A column whose values cannot be reconciled automatically
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    /// Table of the examined records
    pub table: String,
    /// Reference column used to select the pair
    pub key_column: String,
    /// Offending column
    pub column: String,
    /// Behavior that raised the conflict
    pub behavior: ColumnBehavior,
    /// Value on the surviving record
    pub kept: Value,
    /// Value that would be lost
    pub lost: Value,
}

impl std::fmt::Display for FieldConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} ({}): kept {:?}, lost {:?}",
            self.table,
            self.column,
            self.behavior,
            self.kept.as_text(),
            self.lost.as_text()
        )
    }
}

/// Compare two rows over `columns` (PURE)
///
/// Every column is inspected; nothing short-circuits. A missing row reads as
/// all-NULL. Fails only if `table` has no behavior entry at all.
pub fn compare_rows(
    table: &str,
    columns: &[String],
    behaviors: &BehaviorTable,
    kept: Option<&Row>,
    lost: Option<&Row>,
) -> Result<Vec<ColumnComparison>> {
    if !behaviors.is_classified(table) {
        return Err(Error::UnclassifiedTable(table.to_string()));
    }

    let read = |row: Option<&Row>, column: &str| {
        row.and_then(|r| r.get(column)).cloned().unwrap_or_default()
    };

    columns
        .iter()
        .map(|column| {
            let behavior = behaviors.behavior_of(table, column)?;
            let kept = read(kept, column);
            let lost = read(lost, column);
            let blocks = behavior.blocks(&kept, &lost);
            Ok(ColumnComparison {
                column: column.clone(),
                behavior,
                kept,
                lost,
                blocks,
            })
        })
        .collect()
}

/// Fetch the record pair at `location` and compare every column
pub async fn inspect(
    store: &dyn RowStore,
    catalog: &SchemaCatalog,
    behaviors: &BehaviorTable,
    location: &ReferenceColumn,
    keep: EntityId,
    lose: EntityId,
) -> Result<Vec<ColumnComparison>> {
    if !behaviors.is_classified(&location.table) {
        return Err(Error::UnclassifiedTable(location.table.clone()));
    }
    let columns = catalog.describe_table(&location.table).ok_or_else(|| {
        Error::SchemaInconsistency(vec![location.key().to_string()])
    })?;

    let (kept, lost) = store.fetch_pair(location, columns, keep, lose).await?;
    debug!(
        table = %location.table,
        column = %location.column,
        kept_found = kept.is_some(),
        lost_found = lost.is_some(),
        "examining record pair"
    );

    compare_rows(
        &location.table,
        columns,
        behaviors,
        kept.as_ref(),
        lost.as_ref(),
    )
}

/// Blocking columns of the record pair at `location` (empty means safe)
pub async fn evaluate(
    store: &dyn RowStore,
    catalog: &SchemaCatalog,
    behaviors: &BehaviorTable,
    location: &ReferenceColumn,
    keep: EntityId,
    lose: EntityId,
) -> Result<Vec<FieldConflict>> {
    let comparisons = inspect(store, catalog, behaviors, location, keep, lose).await?;
    Ok(comparisons
        .into_iter()
        .filter(|c| c.blocks)
        .map(|c| FieldConflict {
            table: location.table.clone(),
            key_column: location.column.clone(),
            column: c.column,
            behavior: c.behavior,
            kept: c.kept,
            lost: c.lost,
        })
        .collect())
}
