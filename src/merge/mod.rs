//! Merge engine for duplicate entities
//!
//! Three-phase pattern:
//! 1. Gather - check both entities exist, locate references, fetch examined
//!    row pairs (read-only, bounded by schema size)
//! 2. Plan - classify references into a `MergePlan` and compare fields
//!    (pure, testable)
//! 3. Execute - hand the `CommandBatch` to the transactional applier
//!    (effectful)

mod command;
mod conflict;
mod engine;
mod execute;
mod locate;
mod lock;
mod plan;

pub use command::{Assignment, CommandBatch, MergeCommand, build_commands};
pub use conflict::{ColumnComparison, FieldConflict, compare_rows, evaluate, inspect};
pub use engine::{BlockReason, ExaminedPair, Explanation, MergeEngine, MergeOutcome};
pub use execute::{
    ExecutionOutcome, MergeExecutionResult, execute_confirmed, execute_merge, merge_entities,
};
pub use locate::locate;
pub use lock::{EntityClaim, EntityLocks};
pub use plan::{Bucket, Classification, MergePlan, table_plan};
