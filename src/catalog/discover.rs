//! Schema discovery: turn introspection data plus configured foreign keys
//! into a [`SchemaCatalog`].

use super::SchemaCatalog;
use super::pattern::{LikePattern, any_match};
use crate::error::Result;
use crate::store::SchemaSource;
use crate::types::{ColumnKey, EntityTable, ReferenceColumn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Filters applied to the introspection scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Column-name patterns that mark a column as a candidate reference
    #[serde(default)]
    pub include_columns: Vec<LikePattern>,
    /// Table-name patterns excluded from the scan (caches, temp tables...)
    #[serde(default)]
    pub exclude_tables: Vec<LikePattern>,
    /// Table listing custom-data tables and the entity type they extend.
    /// Needs `table_name` and `extends` columns.
    #[serde(default)]
    pub custom_group_table: Option<String>,
    /// Entity types whose custom-data `entity_id` columns are not ours
    #[serde(default)]
    pub excluded_entity_types: Vec<String>,
}

/// A foreign key the application already knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnownReference {
    /// Table name
    pub table: String,
    /// Column holding the entity id
    pub column: String,
    /// Sibling column naming the referenced entity type, for polymorphic keys
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl KnownReference {
    fn resolve(&self, entity: &EntityTable) -> ReferenceColumn {
        match &self.discriminator {
            Some(d) => ReferenceColumn::compound(&self.table, &self.column, d, entity.tag()),
            None => ReferenceColumn::simple(&self.table, &self.column),
        }
    }
}

/// Scan the schema and build the catalog of reference columns.
///
/// The result is the union of
/// - configured known references whose table and column exist,
/// - every column matching an include pattern in a table not matching an
///   exclude pattern, minus `entity_id` columns of custom-data tables that
///   extend an excluded entity type,
/// - the entity table's own key,
///
/// with ignored columns removed. A known compound reference wins over a
/// scanned simple one for the same column.
pub async fn discover_catalog(
    source: &dyn SchemaSource,
    entity: &EntityTable,
    discovery: &DiscoveryConfig,
    known: &[KnownReference],
    ignore: &BTreeSet<ColumnKey>,
) -> Result<SchemaCatalog> {
    let mut table_columns = BTreeMap::new();
    for table in source.list_tables().await? {
        let columns = source.describe_table(&table).await?;
        table_columns.insert(table, columns);
    }
    debug!(tables = table_columns.len(), "described schema");

    let has_column = |table: &str, column: &str| {
        table_columns
            .get(table)
            .is_some_and(|cols: &Vec<String>| cols.iter().any(|c| c == column))
    };

    let mut references: BTreeMap<ColumnKey, ReferenceColumn> = BTreeMap::new();

    for reference in known {
        let column_ok = has_column(&reference.table, &reference.column);
        let discriminator_ok = reference
            .discriminator
            .as_deref()
            .is_none_or(|d| has_column(&reference.table, d));
        if column_ok && discriminator_ok {
            let resolved = reference.resolve(entity);
            references.insert(resolved.key(), resolved);
        } else {
            debug!(
                table = %reference.table,
                column = %reference.column,
                "known reference not present in schema"
            );
        }
    }

    let excluded_custom: BTreeSet<String> = match &discovery.custom_group_table {
        Some(registry) if table_columns.contains_key(registry) => source
            .custom_entity_tables(registry, &discovery.excluded_entity_types)
            .await?
            .into_iter()
            .collect(),
        _ => BTreeSet::new(),
    };

    for (table, columns) in &table_columns {
        if any_match(&discovery.exclude_tables, table) {
            continue;
        }
        for column in columns {
            if !any_match(&discovery.include_columns, column) {
                continue;
            }
            if column == "entity_id" && excluded_custom.contains(table) {
                debug!(%table, "custom data table extends a non-entity type");
                continue;
            }
            let key = ColumnKey::new(table, column);
            references
                .entry(key)
                .or_insert_with(|| ReferenceColumn::simple(table, column));
        }
    }

    if has_column(&entity.table, &entity.key) {
        references
            .entry(entity.root_column())
            .or_insert_with(|| ReferenceColumn::simple(&entity.table, &entity.key));
    }

    references.retain(|key, _| !ignore.contains(key));
    debug!(references = references.len(), "discovered reference columns");

    SchemaCatalog::new(references.into_values(), table_columns)
}
