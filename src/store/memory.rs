use crate::error::{Error, Result};
use crate::merge::{CommandBatch, MergeCommand};
use crate::store::{ApplyStatus, AuditRecorder, MergeApplier, RowStore, SchemaSource};
use crate::types::{EntityId, Filter, Row, Value};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl MemoryTable {
    fn check_column(&self, table: &str, column: &str) -> Result<()> {
        if self.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(Error::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }

    fn check_filter(&self, table: &str, filter: &Filter) -> Result<()> {
        filter
            .columns()
            .try_for_each(|column| self.check_column(table, column))
    }
}

/// A note left by [`AuditRecorder::record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditNote {
    /// Entity the note is attached to
    pub entity: EntityId,
    /// Short subject line
    pub subject: String,
    /// Note body
    pub message: String,
}

/// In-memory relational store.
///
/// Intended for tests and embedding. Tables are held behind a `RwLock`;
/// [`MergeApplier::apply`] works on a copy of all tables and swaps it in only
/// when every command succeeded, so a failed batch leaves nothing behind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, MemoryTable>>,
    notes: Mutex<Vec<AuditNote>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given columns
    pub fn create_table(&self, table: &str, columns: &[&str]) {
        self.tables.write().expect("lock poisoned").insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(ToString::to_string).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Insert a row; unspecified columns are NULL
    pub fn insert<'a>(
        &self,
        table: &str,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<()> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let target = tables
            .get_mut(table)
            .ok_or_else(|| Error::Store(format!("no such table: {table}")))?;
        let mut row: Row = target
            .columns
            .iter()
            .map(|c| (c.clone(), Value::Null))
            .collect();
        for (column, value) in values {
            target.check_column(table, column)?;
            row.insert(column.to_string(), value);
        }
        target.rows.push(row);
        Ok(())
    }

    /// Snapshot of a table's rows
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Rows of `table` matching `filter`
    pub fn select(&self, table: &str, filter: &Filter) -> Vec<Row> {
        self.rows(table)
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect()
    }

    /// Notes recorded so far
    pub fn notes(&self) -> Vec<AuditNote> {
        self.notes.lock().expect("lock poisoned").clone()
    }
}

fn table_mut<'a>(
    tables: &'a mut BTreeMap<String, MemoryTable>,
    name: &str,
) -> Result<&'a mut MemoryTable> {
    tables
        .get_mut(name)
        .ok_or_else(|| Error::Store(format!("no such table: {name}")))
}

fn apply_command(
    tables: &mut BTreeMap<String, MemoryTable>,
    batch: &CommandBatch,
    command: &MergeCommand,
) -> Result<u64> {
    match command {
        MergeCommand::UpdateReference {
            location,
            from,
            to,
            assignments,
        } => {
            let table = table_mut(tables, &location.table)?;
            let filter = location.filter(*from);
            table.check_filter(&location.table, &filter)?;
            for assignment in assignments {
                table.check_column(&location.table, &assignment.column)?;
            }
            let mut touched = 0;
            for row in table.rows.iter_mut().filter(|r| filter.matches(r)) {
                row.insert(location.column.clone(), to.value());
                for assignment in assignments {
                    row.insert(assignment.column.clone(), assignment.value.clone());
                }
                touched += 1;
            }
            Ok(touched)
        }
        MergeCommand::DeleteRecord { location, from } => {
            let table = table_mut(tables, &location.table)?;
            let filter = location.filter(*from);
            table.check_filter(&location.table, &filter)?;
            let before = table.rows.len();
            table.rows.retain(|r| !filter.matches(r));
            Ok((before - table.rows.len()) as u64)
        }
        MergeCommand::MarkSuperseded { entity } => {
            let entity_table = &batch.entity;
            let table = table_mut(tables, &entity_table.table)?;
            table.check_column(&entity_table.table, &entity_table.superseded_column)?;
            let filter = Filter::new().eq(&entity_table.key, entity.value());
            let mut touched = 0;
            for row in table.rows.iter_mut().filter(|r| filter.matches(r)) {
                row.insert(entity_table.superseded_column.clone(), Value::Integer(1));
                touched += 1;
            }
            Ok(touched)
        }
    }
}

#[async_trait]
impl SchemaSource for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self
            .tables
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<String>> {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| Error::Store(format!("no such table: {table}")))
    }

    async fn custom_entity_tables(
        &self,
        registry: &str,
        entity_types: &[String],
    ) -> Result<Vec<String>> {
        let types: Vec<Value> = entity_types.iter().map(|t| Value::from(t.as_str())).collect();
        Ok(self
            .select(registry, &Filter::new().one_of("extends", types))
            .into_iter()
            .filter_map(|row| match row.get("table_name") {
                Some(Value::Text(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let tables = self.tables.read().expect("lock poisoned");
        let target = tables
            .get(table)
            .ok_or_else(|| Error::Store(format!("no such table: {table}")))?;
        target.check_filter(table, filter)?;
        Ok(target.rows.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn fetch_first(
        &self,
        table: &str,
        columns: &[String],
        filter: &Filter,
    ) -> Result<Option<Row>> {
        let tables = self.tables.read().expect("lock poisoned");
        let target = tables
            .get(table)
            .ok_or_else(|| Error::Store(format!("no such table: {table}")))?;
        target.check_filter(table, filter)?;
        Ok(target.rows.iter().find(|r| filter.matches(r)).map(|row| {
            if columns.is_empty() {
                row.clone()
            } else {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or_default()))
                    .collect()
            }
        }))
    }
}

#[async_trait]
impl MergeApplier for MemoryStore {
    async fn apply(&self, batch: &CommandBatch) -> Result<ApplyStatus> {
        let mut tables = self.tables.write().expect("lock poisoned");

        let active_filter = batch.entity.active_filter(&[batch.keep, batch.lose]);
        let active = tables
            .get(&batch.entity.table)
            .map_or(0, |t| t.rows.iter().filter(|r| active_filter.matches(r)).count());
        if active != 2 {
            return Ok(ApplyStatus::RolledBack {
                reason: format!(
                    "entities {} and {} are no longer both active",
                    batch.keep, batch.lose
                ),
            });
        }

        let mut working = tables.clone();
        let mut rows_affected = 0;
        for command in &batch.commands {
            match apply_command(&mut working, batch, command) {
                Ok(n) => rows_affected += n,
                Err(e) => {
                    debug!(%command, error = %e, "rolling back merge batch");
                    return Ok(ApplyStatus::RolledBack {
                        reason: format!("{command}: {e}"),
                    });
                }
            }
        }
        *tables = working;
        Ok(ApplyStatus::Committed { rows_affected })
    }
}

#[async_trait]
impl AuditRecorder for MemoryStore {
    async fn record(&self, entity: EntityId, subject: &str, message: &str) -> Result<()> {
        self.notes.lock().expect("lock poisoned").push(AuditNote {
            entity,
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
