//! Merge planning - pure classification of located references
//!
//! No I/O happens here: the located references and the classification lists
//! are passed in, making the partition logic easy to unit test.

use crate::catalog::SchemaCatalog;
use crate::types::{ColumnKey, ReferenceColumn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Configured handling of reference columns, keyed by `table.column`
///
/// The lists are disjoint by contract. Nothing enforces that at load time;
/// [`table_plan`] resolves overlaps as delete > update > examine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Classification {
    /// Columns left untouched; never part of a plan
    #[serde(default)]
    pub ignore: BTreeSet<ColumnKey>,
    /// Rows referencing the losing entity are deleted
    #[serde(default)]
    pub delete: BTreeSet<ColumnKey>,
    /// References are repointed to the surviving entity
    #[serde(default)]
    pub update: BTreeSet<ColumnKey>,
    /// Row pairs need a field-by-field comparison
    #[serde(default)]
    pub examine: BTreeSet<ColumnKey>,
}

impl Classification {
    /// Every configured entry across the four lists
    pub fn entries(&self) -> impl Iterator<Item = &ColumnKey> {
        self.ignore
            .iter()
            .chain(&self.delete)
            .chain(&self.update)
            .chain(&self.examine)
    }

    /// Configured entries absent from the catalog, as `table.column`
    pub fn missing_from(&self, catalog: &SchemaCatalog) -> Vec<String> {
        let mut missing = catalog.missing(self.entries());
        missing.sort();
        missing.dedup();
        missing
    }

    /// Bucket a key belongs to, if any
    pub fn bucket_of(&self, key: &ColumnKey) -> Option<Bucket> {
        let hits: Vec<Bucket> = [
            (Bucket::Delete, &self.delete),
            (Bucket::Update, &self.update),
            (Bucket::Examine, &self.examine),
        ]
        .into_iter()
        .filter(|(_, list)| list.contains(key))
        .map(|(bucket, _)| bucket)
        .collect();

        if hits.len() > 1 {
            warn!(%key, ?hits, "column appears in several classification lists");
        }
        hits.first().copied()
    }
}

/// Plan bucket of a located reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Delete referencing rows
    Delete,
    /// Repoint references
    Update,
    /// Compare row pairs field by field
    Examine,
    /// No configured handling
    Blocker,
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Examine => "examine",
            Self::Blocker => "blocker",
        })
    }
}

/// Merge plan - the functional core output
///
/// Every located reference lands in exactly one of the four sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    /// References whose rows are deleted
    pub delete: BTreeSet<ReferenceColumn>,
    /// References repointed to the surviving entity
    pub update: BTreeSet<ReferenceColumn>,
    /// References needing field-level comparison
    pub examine: BTreeSet<ReferenceColumn>,
    /// References with no configured handling
    pub blockers: BTreeSet<ReferenceColumn>,
}

impl MergePlan {
    /// Whether any reference blocks the merge outright
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }

    /// Total number of classified references
    #[must_use]
    pub fn len(&self) -> usize {
        self.delete.len() + self.update.len() + self.examine.len() + self.blockers.len()
    }

    /// True when nothing references the losing entity
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All references in bucket order, with their bucket
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &ReferenceColumn)> {
        self.delete
            .iter()
            .map(|r| (Bucket::Delete, r))
            .chain(self.update.iter().map(|r| (Bucket::Update, r)))
            .chain(self.examine.iter().map(|r| (Bucket::Examine, r)))
            .chain(self.blockers.iter().map(|r| (Bucket::Blocker, r)))
    }
}

/// Classify located references (PURE - no I/O, easily testable)
///
/// Anything not claimed by the delete, update or examine list becomes a
/// blocker: a reference column nobody has configured might carry data that
/// would be lost. Ignored columns are normally removed during discovery; any
/// that slip through are dropped here.
#[must_use]
pub fn table_plan<'a>(
    locations: impl IntoIterator<Item = &'a ReferenceColumn>,
    classification: &Classification,
) -> MergePlan {
    let mut plan = MergePlan::default();

    for location in locations {
        let key = location.key();
        if classification.ignore.contains(&key) {
            continue;
        }
        let bucket = match classification.bucket_of(&key) {
            Some(Bucket::Delete) => &mut plan.delete,
            Some(Bucket::Update) => &mut plan.update,
            Some(Bucket::Examine) => &mut plan.examine,
            Some(Bucket::Blocker) | None => &mut plan.blockers,
        };
        bucket.insert(location.clone());
    }

    plan
}
