//! Merge execution - effectful operations
//!
//! Takes the `CommandBatch` of a ready outcome and hands it to the
//! transactional applier, then leaves audit notes on both entities.

use crate::error::Result;
use crate::merge::command::CommandBatch;
use crate::merge::engine::{MergeEngine, MergeOutcome};
use crate::merge::lock::EntityLocks;
use crate::store::{ApplyStatus, AuditRecorder, MergeApplier};
use crate::types::EntityId;
use serde::Serialize;
use tracing::{info, warn};

/// Result of handing a batch to the applier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Committed
    Applied {
        /// Rows touched by all commands
        rows_affected: u64,
    },
    /// Nothing was written
    Failed {
        /// Applier's explanation
        reason: String,
    },
}

/// Planning outcome plus, for ready merges, what happened on apply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeExecutionResult {
    /// Engine verdict
    pub outcome: MergeOutcome,
    /// Apply result; `None` unless the outcome was ready
    pub execution: Option<ExecutionOutcome>,
}

impl MergeExecutionResult {
    /// Check if the merge was applied
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.execution, Some(ExecutionOutcome::Applied { .. }))
    }

    /// Check if a ready batch was rejected by the applier
    #[must_use]
    pub const fn is_execution_failure(&self) -> bool {
        matches!(self.execution, Some(ExecutionOutcome::Failed { .. }))
    }
}

/// Apply a ready batch (EFFECTFUL)
///
/// Applier errors are folded into [`ExecutionOutcome::Failed`]: by contract
/// a failed apply wrote nothing. Audit notes are best effort; a failure is
/// logged and does not undo the merge.
pub async fn execute_merge(
    batch: &CommandBatch,
    applier: &dyn MergeApplier,
    audit: Option<&dyn AuditRecorder>,
) -> ExecutionOutcome {
    let outcome = match applier.apply(batch).await {
        Ok(ApplyStatus::Committed { rows_affected }) => {
            info!(keep = %batch.keep, lose = %batch.lose, rows_affected, "merge applied");
            ExecutionOutcome::Applied { rows_affected }
        }
        Ok(ApplyStatus::RolledBack { reason }) => {
            warn!(keep = %batch.keep, lose = %batch.lose, %reason, "merge rolled back");
            ExecutionOutcome::Failed { reason }
        }
        Err(e) => {
            warn!(keep = %batch.keep, lose = %batch.lose, error = %e, "merge apply failed");
            ExecutionOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    if let (ExecutionOutcome::Applied { .. }, Some(recorder)) = (&outcome, audit) {
        record_notes(recorder, batch.keep, batch.lose).await;
    }

    outcome
}

async fn record_notes(recorder: &dyn AuditRecorder, keep: EntityId, lose: EntityId) {
    let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let notes = [
        (
            keep,
            "Target of automerge",
            format!("This record has been merged from the duplicate {lose} ({stamp})"),
        ),
        (
            lose,
            "Duplicate. Superseded during automerge",
            format!("This record was merged to {keep} ({stamp})"),
        ),
    ];
    for (entity, subject, message) in notes {
        if let Err(e) = recorder.record(entity, subject, &message).await {
            warn!(%entity, error = %e, "failed to record audit note");
        }
    }
}

/// Plan and, if ready, apply a merge while owning both ids.
///
/// The claim on `{keep, lose}` spans the existence check through the end of
/// apply, so merges sharing an id run one after the other.
pub async fn merge_entities(
    engine: &MergeEngine<'_>,
    applier: &dyn MergeApplier,
    audit: Option<&dyn AuditRecorder>,
    locks: &EntityLocks,
    keep: EntityId,
    lose: EntityId,
) -> Result<MergeExecutionResult> {
    let _claim = locks.claim(&[keep, lose]).await;

    let outcome = engine.plan_merge(keep, lose).await?;
    let execution = match &outcome {
        MergeOutcome::Ready { batch, .. } => Some(execute_merge(batch, applier, audit).await),
        _ => None,
    };

    Ok(MergeExecutionResult { outcome, execution })
}

/// Apply a merge the user confirmed from an earlier plan.
///
/// The store is re-planned first. If the fresh plan differs from `confirmed`
/// nothing is applied: a non-ready outcome is returned as is, and a ready
/// one with a different batch is reported as a failed execution.
pub async fn execute_confirmed(
    engine: &MergeEngine<'_>,
    applier: &dyn MergeApplier,
    audit: Option<&dyn AuditRecorder>,
    confirmed: &MergeOutcome,
    keep: EntityId,
    lose: EntityId,
) -> Result<MergeExecutionResult> {
    let outcome = engine.plan_merge(keep, lose).await?;
    let execution = match &outcome {
        MergeOutcome::Ready { batch, .. } if outcome == *confirmed => {
            Some(execute_merge(batch, applier, audit).await)
        }
        MergeOutcome::Ready { .. } => {
            warn!(%keep, %lose, "plan changed since confirmation");
            Some(ExecutionOutcome::Failed {
                reason: "records changed since the plan was confirmed".to_string(),
            })
        }
        _ => None,
    };

    Ok(MergeExecutionResult { outcome, execution })
}
