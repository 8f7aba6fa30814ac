//! Merge orchestration: existence check, planning, examination, commands

use crate::catalog::SchemaCatalog;
use crate::config::MergeConfig;
use crate::error::{Error, Result};
use crate::merge::command::{CommandBatch, build_commands};
use crate::merge::conflict::{ColumnComparison, FieldConflict, evaluate, inspect};
use crate::merge::locate::locate;
use crate::merge::plan::{MergePlan, table_plan};
use crate::store::RowStore;
use crate::types::{EntityId, ReferenceColumn};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Why a merge cannot proceed automatically
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// A located reference is in none of the classification lists
    UnclassifiedReference {
        /// The offending reference column
        reference: ReferenceColumn,
    },
    /// An examined record pair disagrees on a column
    FieldConflict(FieldConflict),
    /// An examined table has no column behaviors configured
    UnclassifiedTable {
        /// Table name
        table: String,
    },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnclassifiedReference { reference } => {
                write!(f, "unclassified reference {reference}")
            }
            Self::FieldConflict(conflict) => write!(f, "conflict on {conflict}"),
            Self::UnclassifiedTable { table } => {
                write!(f, "table {table} has no column behaviors configured")
            }
        }
    }
}

/// Terminal result of [`MergeEngine::plan_merge`]
///
/// Every variant except `Ready` is a side-effect-free report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Safe to merge; `batch` is ready for the applier
    Ready {
        /// Classified references of the losing entity
        plan: MergePlan,
        /// Commands to apply atomically
        batch: CommandBatch,
    },
    /// Automatic merge would lose information
    Blocked {
        /// Every reason found, not just the first
        reasons: Vec<BlockReason>,
    },
    /// Neither entity is active
    NotFound,
    /// Exactly one entity is active
    PartiallyFound,
    /// Configured columns are absent from the schema catalog
    SchemaInconsistency {
        /// Offending `table.column` entries
        entries: Vec<String>,
    },
}

impl MergeOutcome {
    /// Whether the outcome carries a command batch
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Short label for display
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Blocked { .. } => "blocked",
            Self::NotFound => "not found",
            Self::PartiallyFound => "partially found",
            Self::SchemaInconsistency { .. } => "schema inconsistency",
        }
    }
}

/// Field comparisons for one examined reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExaminedPair {
    /// Examined reference column
    pub location: ReferenceColumn,
    /// Per-column verdicts; `None` when the table has no behaviors configured
    pub comparisons: Option<Vec<ColumnComparison>>,
}

/// Everything the engine sees for a pair, without deciding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// Active entities among keep/lose
    pub active: u64,
    /// Table plan of the losing entity
    pub plan: MergePlan,
    /// Field comparisons of every examined reference
    pub examined: Vec<ExaminedPair>,
}

/// Merge planner bound to one catalog, config and store
///
/// The catalog and config are read-only for the engine's lifetime; callers
/// rebuild the catalog when the schema changes.
pub struct MergeEngine<'a> {
    catalog: &'a SchemaCatalog,
    config: &'a MergeConfig,
    store: &'a dyn RowStore,
}

impl<'a> MergeEngine<'a> {
    /// Create an engine
    pub fn new(
        catalog: &'a SchemaCatalog,
        config: &'a MergeConfig,
        store: &'a dyn RowStore,
    ) -> Self {
        Self {
            catalog,
            config,
            store,
        }
    }

    /// Catalog in use
    pub const fn catalog(&self) -> &SchemaCatalog {
        self.catalog
    }

    /// Config in use
    pub const fn config(&self) -> &MergeConfig {
        self.config
    }

    fn check_config(&self) -> Result<()> {
        let missing = self.config.validate(self.catalog);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaInconsistency(missing))
        }
    }

    /// Reference columns currently holding `id`
    pub async fn locate(&self, id: EntityId) -> Result<BTreeSet<ReferenceColumn>> {
        locate(self.store, self.catalog, id).await
    }

    /// Table plan for `id` as the losing entity
    pub async fn table_plan(&self, id: EntityId) -> Result<MergePlan> {
        self.check_config()?;
        let locations = self.locate(id).await?;
        Ok(table_plan(&locations, &self.config.classification))
    }

    async fn count_active(&self, keep: EntityId, lose: EntityId) -> Result<u64> {
        let entity = &self.config.entity;
        let active = self
            .store
            .count(&entity.table, &entity.active_filter(&[keep, lose]))
            .await?;
        if active > 2 {
            return Err(Error::Internal(format!(
                "{}.{} is not unique: {active} rows for two ids",
                entity.table, entity.key
            )));
        }
        Ok(active)
    }

    /// Decide whether `lose` can be merged into `keep`.
    ///
    /// Reads only. Returns `Err` just for store faults; everything the engine
    /// can reason about is reported through [`MergeOutcome`].
    pub async fn plan_merge(&self, keep: EntityId, lose: EntityId) -> Result<MergeOutcome> {
        let missing = self.config.validate(self.catalog);
        if !missing.is_empty() {
            return Ok(MergeOutcome::SchemaInconsistency { entries: missing });
        }

        match self.count_active(keep, lose).await? {
            0 => return Ok(MergeOutcome::NotFound),
            1 => return Ok(MergeOutcome::PartiallyFound),
            _ => {}
        }

        let locations = self.locate(lose).await?;
        let plan = table_plan(&locations, &self.config.classification);
        debug!(
            %keep, %lose,
            update = plan.update.len(),
            delete = plan.delete.len(),
            examine = plan.examine.len(),
            blockers = plan.blockers.len(),
            "table plan"
        );

        if plan.is_blocked() {
            let reasons = plan
                .blockers
                .iter()
                .map(|reference| BlockReason::UnclassifiedReference {
                    reference: reference.clone(),
                })
                .collect();
            return Ok(MergeOutcome::Blocked { reasons });
        }

        let mut reasons = Vec::new();
        for location in &plan.examine {
            match evaluate(
                self.store,
                self.catalog,
                &self.config.behaviors,
                location,
                keep,
                lose,
            )
            .await
            {
                Ok(conflicts) => {
                    reasons.extend(conflicts.into_iter().map(BlockReason::FieldConflict));
                }
                Err(Error::UnclassifiedTable(table)) => {
                    reasons.push(BlockReason::UnclassifiedTable { table });
                }
                Err(e) => return Err(e),
            }
        }
        if !reasons.is_empty() {
            return Ok(MergeOutcome::Blocked { reasons });
        }

        let batch = build_commands(
            &self.config.entity,
            self.catalog,
            &plan,
            &self.config.side_effects,
            keep,
            lose,
        )?;
        info!(%keep, %lose, commands = batch.len(), "merge ready");
        Ok(MergeOutcome::Ready { plan, batch })
    }

    /// Gather the plan and every field comparison for display
    pub async fn explain(&self, keep: EntityId, lose: EntityId) -> Result<Explanation> {
        let active = self.count_active(keep, lose).await?;
        let plan = self.table_plan(lose).await?;

        let mut examined = Vec::with_capacity(plan.examine.len());
        for location in &plan.examine {
            let comparisons = match inspect(
                self.store,
                self.catalog,
                &self.config.behaviors,
                location,
                keep,
                lose,
            )
            .await
            {
                Ok(c) => Some(c),
                Err(Error::UnclassifiedTable(_)) => None,
                Err(e) => return Err(e),
            };
            examined.push(ExaminedPair {
                location: location.clone(),
                comparisons,
            });
        }

        Ok(Explanation {
            active,
            plan,
            examined,
        })
    }
}
