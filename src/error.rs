//! Error types for auto-dedupe

use thiserror::Error;

/// Errors that can escape the merge engine
///
/// Blocked merges, missing entities and schema/config mismatches found while
/// planning are reported through [`MergeOutcome`](crate::merge::MergeOutcome),
/// not through this type. An `Error` means the engine could not reason at all.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Configured columns are absent from the schema catalog
    #[error("schema inconsistency: {} not present in schema", .0.join(", "))]
    SchemaInconsistency(Vec<String>),

    /// A table has no entry at all in the column behavior table
    #[error("table {0} has no column behavior configured")]
    UnclassifiedTable(String),

    /// A table or column name failed identifier validation
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Entity ids must be positive
    #[error("invalid entity id: {0}")]
    InvalidEntityId(i64),

    /// Identifier is syntactically valid but not part of the catalog
    #[error("unknown column {table}.{column}")]
    UnknownColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },

    /// The underlying data store failed
    #[error("store error: {0}")]
    Store(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant broken
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
