//! Shared fixtures for the test suites
//!
//! Not every helper is used by every test binary.

#![allow(dead_code)]

pub mod mock_store;

pub use mock_store::MockStore;

use auto_dedupe::catalog::{SchemaCatalog, discover_catalog};
use auto_dedupe::config::MergeConfig;
use auto_dedupe::store::{MemoryStore, SchemaSource};
use auto_dedupe::types::{EntityId, ReferenceColumn, Value};
use std::collections::BTreeMap;

/// Config for the `people` fixture schema
pub const PEOPLE_CONFIG: &str = r#"
[entity]
table = "people"

[discovery]
include_columns = ["%customer_id", "%owner_id", "contact_id"]
exclude_tables = ["%_cache"]

[[references]]
table = "notes"
column = "entity_id"
discriminator = "entity_table"

[classification]
ignore = ["audit_log.contact_id"]
delete = ["matches.contact_id"]
update = ["orders.customer_id", "emails.contact_id", "notes.entity_id"]
examine = ["people.id"]

[behaviors.people]
id = "Ignore"
flag = "BlockIfGreater"
first_name = "AllowSingleCharBlankOrMatch"
last_name = "IgnoreTruncation"

[side_effects.emails]
is_primary = 0
"#;

/// Shorthand for a valid id
pub fn id(v: i64) -> EntityId {
    EntityId::new(v).unwrap()
}

/// Parsed [`PEOPLE_CONFIG`]
pub fn people_config() -> MergeConfig {
    MergeConfig::from_toml(PEOPLE_CONFIG).unwrap()
}

/// Empty `people` schema
///
/// `legacy_widgets.owner_id` is discovered but deliberately unclassified.
pub fn people_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table(
        "people",
        &["id", "is_deleted", "first_name", "last_name", "flag"],
    );
    store.create_table("orders", &["id", "customer_id"]);
    store.create_table("emails", &["id", "contact_id", "email", "is_primary"]);
    store.create_table("notes", &["id", "entity_table", "entity_id", "note"]);
    store.create_table("matches", &["id", "contact_id"]);
    store.create_table("audit_log", &["id", "contact_id"]);
    store.create_table("legacy_widgets", &["id", "owner_id"]);
    store.create_table("people_cache", &["contact_id"]);
    store
}

/// Insert an active person
pub fn add_person(store: &MemoryStore, person: i64, first: &str, last: &str, flag: i64) {
    store
        .insert(
            "people",
            [
                ("id", Value::Integer(person)),
                ("is_deleted", Value::Integer(0)),
                ("first_name", Value::from(first)),
                ("last_name", Value::from(last)),
                ("flag", Value::Integer(flag)),
            ],
        )
        .unwrap();
}

/// Insert a row given as `(column, value)` pairs
pub fn add_row(store: &MemoryStore, table: &str, values: &[(&str, Value)]) {
    store.insert(table, values.iter().cloned()).unwrap();
}

/// Run discovery over a store with a config
pub async fn discover(store: &dyn SchemaSource, config: &MergeConfig) -> SchemaCatalog {
    discover_catalog(
        store,
        &config.entity,
        &config.discovery,
        &config.references,
        &config.classification.ignore,
    )
    .await
    .unwrap()
}

/// Catalog over every table of `store` with exactly `references`
pub async fn catalog_with(
    store: &dyn SchemaSource,
    references: impl IntoIterator<Item = ReferenceColumn>,
) -> SchemaCatalog {
    let mut tables = BTreeMap::new();
    for table in store.list_tables().await.unwrap() {
        let columns = store.describe_table(&table).await.unwrap();
        tables.insert(table, columns);
    }
    SchemaCatalog::new(references, tables).unwrap()
}

/// Column value of the first row of `table` where `key = key_value`
pub fn value_of(store: &MemoryStore, table: &str, key: i64, column: &str) -> Value {
    store
        .rows(table)
        .into_iter()
        .find(|row| row.get("id") == Some(&Value::Integer(key)))
        .and_then(|row| row.get(column).cloned())
        .unwrap_or_default()
}
