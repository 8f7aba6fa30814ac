//! Merge configuration (`merge.toml`)
//!
//! Everything the engine needs to know about a particular schema lives here
//! as data: the entity table, discovery filters, known foreign keys, the four
//! classification lists, column behaviors and side-effect assignments.

use crate::catalog::{DiscoveryConfig, KnownReference, SchemaCatalog};
use crate::error::{Error, Result};
use crate::merge::Classification;
use crate::policy::BehaviorTable;
use crate::types::{EntityTable, Value, validate_identifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name under the user config directory
const CONFIG_DIR: &str = "auto-dedupe";

/// Default config filename
const CONFIG_FILE: &str = "merge.toml";

const TEMPLATE: &str = include_str!("../config/template.toml");

/// Where post-merge audit notes are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Note table; needs `entity_table`, `entity_id`, `subject` and `note`
    pub table: String,
}

/// Complete merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Table of the entities being deduplicated
    pub entity: EntityTable,
    /// Schema scan filters
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Foreign keys known up front, including polymorphic ones
    #[serde(default)]
    pub references: Vec<KnownReference>,
    /// ignore / delete / update / examine lists
    #[serde(default)]
    pub classification: Classification,
    /// Column behaviors of examined tables
    #[serde(default)]
    pub behaviors: BehaviorTable,
    /// Extra assignments applied to repointed rows, per table
    #[serde(default)]
    pub side_effects: BTreeMap<String, BTreeMap<String, Value>>,
    /// Post-merge notes
    #[serde(default)]
    pub audit: Option<AuditConfig>,
}

impl MergeConfig {
    /// Parse a config from TOML text and check its identifiers
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.check_identifiers()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str::<Self>(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
            .and_then(|config| config.check_identifiers().map(|()| config))
    }

    /// The starter configuration shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml(TEMPLATE)
    }

    /// Raw text of the starter configuration
    pub const fn template() -> &'static str {
        TEMPLATE
    }

    /// Side-effect assignments for rows of `table`
    pub fn assignments_for(&self, table: &str) -> Option<&BTreeMap<String, Value>> {
        self.side_effects.get(table)
    }

    fn check_identifiers(&self) -> Result<()> {
        validate_identifier(&self.entity.table)?;
        validate_identifier(&self.entity.key)?;
        validate_identifier(&self.entity.superseded_column)?;
        for reference in &self.references {
            validate_identifier(&reference.table)?;
            validate_identifier(&reference.column)?;
            if let Some(d) = &reference.discriminator {
                validate_identifier(d)?;
            }
        }
        for (table, columns) in &self.side_effects {
            validate_identifier(table)?;
            for column in columns.keys() {
                validate_identifier(column)?;
            }
        }
        if let Some(audit) = &self.audit {
            validate_identifier(&audit.table)?;
        }
        Ok(())
    }

    /// Configured names that the catalog does not contain, as `table.column`.
    ///
    /// Covers the classification lists, the entity key and flag columns, and
    /// side-effect columns of tables present in the schema. The entity's own
    /// key column may only be examined; listing it anywhere else would skip
    /// the field comparison, so it is reported too.
    pub fn validate(&self, catalog: &SchemaCatalog) -> Vec<String> {
        let mut missing = self.classification.missing_from(catalog);

        let root = self.entity.root_column();
        let lists = [
            ("ignore", &self.classification.ignore),
            ("delete", &self.classification.delete),
            ("update", &self.classification.update),
        ];
        for (list, keys) in lists {
            if keys.contains(&root) {
                missing.push(format!("{root} (entity key listed under {list})"));
            }
        }

        for column in [&self.entity.key, &self.entity.superseded_column] {
            if !catalog.has_column(&self.entity.table, column) {
                missing.push(format!("{}.{column}", self.entity.table));
            }
        }

        for (table, columns) in &self.side_effects {
            if catalog.describe_table(table).is_none() {
                continue;
            }
            for column in columns.keys() {
                if !catalog.has_column(table, column) {
                    missing.push(format!("{table}.{column}"));
                }
            }
        }

        missing.sort();
        missing.dedup();
        missing
    }
}

/// Default config location: `<config dir>/auto-dedupe/merge.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Resolve and load the config: explicit path first, then the default
/// location. A missing default file is an error naming where to put one.
pub fn resolve(explicit: Option<&Path>) -> Result<MergeConfig> {
    if let Some(path) = explicit {
        return MergeConfig::load(path);
    }
    let path = default_config_path()
        .ok_or_else(|| Error::Config("no config directory on this platform".to_string()))?;
    if !path.exists() {
        return Err(Error::Config(format!(
            "no config at {}; create one with `dedupe config > {}`",
            path.display(),
            path.display()
        )));
    }
    MergeConfig::load(&path)
}
