//! Schema catalog: every column that can reference the merged entity
//!
//! The catalog is built once (usually by [`discover_catalog`]) and then only
//! read. Nothing in the merge engine mutates it, and it is passed explicitly
//! to every call rather than cached globally.

mod discover;
mod pattern;

pub use discover::{DiscoveryConfig, KnownReference, discover_catalog};
pub use pattern::{LikePattern, any_match};

use crate::error::{Error, Result};
use crate::types::{ColumnKey, ReferenceColumn, validate_identifier};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only index of reference columns and table layouts
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaCatalog {
    reference_columns: BTreeSet<ReferenceColumn>,
    table_columns: BTreeMap<String, Vec<String>>,
}

impl SchemaCatalog {
    /// Build a catalog, checking that every reference column (and its
    /// discriminator) exists in `table_columns` and that every name is a
    /// plain identifier.
    pub fn new(
        reference_columns: impl IntoIterator<Item = ReferenceColumn>,
        table_columns: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        for (table, columns) in &table_columns {
            validate_identifier(table)?;
            for column in columns {
                validate_identifier(column)?;
            }
        }

        let catalog = Self {
            reference_columns: reference_columns.into_iter().collect(),
            table_columns,
        };

        let mut missing = Vec::new();
        for reference in &catalog.reference_columns {
            if !catalog.has_column(&reference.table, &reference.column) {
                missing.push(reference.key().to_string());
            }
            if let Some(d) = &reference.discriminator {
                if !catalog.has_column(&reference.table, &d.column) {
                    missing.push(format!("{}.{}", reference.table, d.column));
                }
            }
        }
        if !missing.is_empty() {
            return Err(Error::SchemaInconsistency(missing));
        }

        Ok(catalog)
    }

    /// All columns that can hold an entity id
    pub const fn reference_columns(&self) -> &BTreeSet<ReferenceColumn> {
        &self.reference_columns
    }

    /// Ordered column list of a table, if the table is known
    pub fn describe_table(&self, table: &str) -> Option<&[String]> {
        self.table_columns.get(table).map(Vec::as_slice)
    }

    /// Known table names
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.table_columns.keys().map(String::as_str)
    }

    /// Whether `table.column` exists
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table_columns
            .get(table)
            .is_some_and(|cols| cols.iter().any(|c| c == column))
    }

    /// Allowlist check for a name about to be embedded in a statement
    pub fn check_column(&self, table: &str, column: &str) -> Result<()> {
        if self.has_column(table, column) {
            Ok(())
        } else {
            Err(Error::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }

    /// The subset of `keys` not present in the catalog, as `table.column`
    pub fn missing<'a>(&self, keys: impl IntoIterator<Item = &'a ColumnKey>) -> Vec<String> {
        keys.into_iter()
            .filter(|k| !self.has_column(&k.table, &k.column))
            .map(ToString::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (
                "orders".to_string(),
                vec!["id".to_string(), "customer_id".to_string()],
            ),
            (
                "notes".to_string(),
                vec![
                    "id".to_string(),
                    "entity_id".to_string(),
                    "entity_table".to_string(),
                ],
            ),
        ])
    }

    #[test]
    fn test_new_accepts_consistent_catalog() {
        let catalog = SchemaCatalog::new(
            [
                ReferenceColumn::simple("orders", "customer_id"),
                ReferenceColumn::compound("notes", "entity_id", "entity_table", "people"),
            ],
            tables(),
        )
        .unwrap();

        assert_eq!(catalog.reference_columns().len(), 2);
        assert_eq!(
            catalog.describe_table("orders").unwrap(),
            ["id".to_string(), "customer_id".to_string()]
        );
        assert!(catalog.describe_table("missing").is_none());
    }

    #[test]
    fn test_new_rejects_reference_outside_tables() {
        let err = SchemaCatalog::new([ReferenceColumn::simple("orders", "owner_id")], tables())
            .unwrap_err();
        match err {
            Error::SchemaInconsistency(cols) => assert_eq!(cols, vec!["orders.owner_id"]),
            other => panic!("Expected SchemaInconsistency, got: {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_missing_discriminator() {
        let err = SchemaCatalog::new(
            [ReferenceColumn::compound("orders", "customer_id", "kind", "people")],
            tables(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SchemaInconsistency(_)));
    }

    #[test]
    fn test_check_column_allowlist() {
        let catalog = SchemaCatalog::new([], tables()).unwrap();
        assert!(catalog.check_column("orders", "customer_id").is_ok());
        assert!(matches!(
            catalog.check_column("orders", "nope"),
            Err(Error::UnknownColumn { .. })
        ));
    }
}
