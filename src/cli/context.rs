//! Shared command context for CLI commands
//!
//! Extracts the setup shared by every database command.

use crate::cli::style::{Stylize, check, spinner_style};
use auto_dedupe::catalog::{SchemaCatalog, discover_catalog};
use auto_dedupe::config::{self, MergeConfig};
use auto_dedupe::error::{Error, Result};
use auto_dedupe::merge::MergeEngine;
use auto_dedupe::store::SqliteStore;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Duration;

/// Shared context for CLI commands that touch the database
///
/// Encapsulates:
/// - Loading the merge configuration
/// - Opening the SQLite store (with the audit table, if configured)
/// - Discovering the schema catalog
///
/// The catalog is built once per invocation and never refreshed.
pub struct CommandContext {
    /// Merge configuration
    pub config: MergeConfig,
    /// Database
    pub store: SqliteStore,
    /// Discovered reference columns
    pub catalog: SchemaCatalog,
}

impl CommandContext {
    /// Create a new command context
    ///
    /// `quiet` hides the discovery spinner (JSON output).
    pub async fn new(db: Option<&Path>, config: Option<&Path>, quiet: bool) -> Result<Self> {
        let config = config::resolve(config)?;

        let db =
            db.ok_or_else(|| Error::Config("no database given; pass --db <path>".to_string()))?;
        if !db.exists() {
            return Err(Error::Config(format!("database not found: {}", db.display())));
        }
        let mut store = SqliteStore::open(db)?;
        if let Some(audit) = &config.audit {
            store = store.with_audit_table(&audit.table, config.entity.tag());
        }

        let spinner = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        spinner.set_style(spinner_style());
        spinner.set_message(format!("Scanning schema of {}...", db.display().emphasis()));
        spinner.enable_steady_tick(Duration::from_millis(80));

        let catalog = discover_catalog(
            &store,
            &config.entity,
            &config.discovery,
            &config.references,
            &config.classification.ignore,
        )
        .await;
        let catalog = match catalog {
            Ok(catalog) => catalog,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e);
            }
        };

        spinner.finish_with_message(format!(
            "{} Found {} reference columns",
            check(),
            catalog.reference_columns().len().accent()
        ));

        Ok(Self {
            config,
            store,
            catalog,
        })
    }

    /// Engine over this context's catalog, config and store
    pub fn engine(&self) -> MergeEngine<'_> {
        MergeEngine::new(&self.catalog, &self.config, &self.store)
    }
}
