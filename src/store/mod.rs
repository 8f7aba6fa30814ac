//! Data store seams
//!
//! The merge engine never talks to a database directly. It reads schema
//! metadata through [`SchemaSource`], rows through [`RowStore`], applies
//! command batches through [`MergeApplier`] and leaves notes through
//! [`AuditRecorder`]. [`MemoryStore`] and [`SqliteStore`] implement all four.

mod memory;
pub mod sql;
mod sqlite;

pub use memory::{AuditNote, MemoryStore};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::merge::CommandBatch;
use crate::types::{EntityId, Filter, ReferenceColumn, Row};
use async_trait::async_trait;

/// Schema introspection
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Names of all tables in the schema
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Ordered column names of a table
    async fn describe_table(&self, table: &str) -> Result<Vec<String>>;

    /// Custom-data tables registered in `registry` whose `extends` column is
    /// one of `entity_types`
    async fn custom_entity_tables(
        &self,
        registry: &str,
        entity_types: &[String],
    ) -> Result<Vec<String>>;
}

/// Read access to rows
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Count rows of `table` matching `filter`
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64>;

    /// First row of `table` matching `filter`, restricted to `columns`
    async fn fetch_first(
        &self,
        table: &str,
        columns: &[String],
        filter: &Filter,
    ) -> Result<Option<Row>>;

    /// Fetch the rows referring to `a` and `b` through `reference`.
    ///
    /// Delegates to [`fetch_first`](Self::fetch_first) once per id.
    async fn fetch_pair(
        &self,
        reference: &ReferenceColumn,
        columns: &[String],
        a: EntityId,
        b: EntityId,
    ) -> Result<(Option<Row>, Option<Row>)> {
        let row_a = self
            .fetch_first(&reference.table, columns, &reference.filter(a))
            .await?;
        let row_b = self
            .fetch_first(&reference.table, columns, &reference.filter(b))
            .await?;
        Ok((row_a, row_b))
    }
}

/// Outcome of applying a command batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Every command ran and the transaction committed
    Committed {
        /// Total rows touched
        rows_affected: u64,
    },
    /// Nothing was written
    RolledBack {
        /// Why the batch was rejected
        reason: String,
    },
}

/// All-or-nothing application of a command batch.
///
/// Implementations must re-check, inside the same transaction and before any
/// write, that both entities of the batch are still active.
#[async_trait]
pub trait MergeApplier: Send + Sync {
    /// Apply every command of `batch` atomically
    async fn apply(&self, batch: &CommandBatch) -> Result<ApplyStatus>;
}

/// Post-merge note recorder
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Attach a note to an entity
    async fn record(&self, entity: EntityId, subject: &str, message: &str) -> Result<()>;
}
