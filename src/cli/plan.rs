//! Plan command - decide without writing

use crate::cli::context::CommandContext;
use crate::cli::print_json;
use crate::cli::style::{Stylize, check, cross};
use anstream::println;
use auto_dedupe::error::Result;
use auto_dedupe::merge::{MergeOutcome, MergePlan};
use auto_dedupe::types::EntityId;

/// Run the plan command; `Ok(true)` when the merge is ready
pub async fn run_plan(
    ctx: &CommandContext,
    keep: EntityId,
    lose: EntityId,
    json: bool,
) -> Result<bool> {
    let outcome = ctx.engine().plan_merge(keep, lose).await?;
    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome, keep, lose);
    }
    Ok(outcome.is_ready())
}

/// Print an engine verdict
pub fn print_outcome(outcome: &MergeOutcome, keep: EntityId, lose: EntityId) {
    let pair = format!("{lose} into {keep}");
    match outcome {
        MergeOutcome::Ready { plan, batch } => {
            println!("{} Merge {} is safe", check(), pair.accent());
            print_plan(plan);
            println!("  {} command(s)", batch.len());
        }
        MergeOutcome::Blocked { reasons } => {
            println!("{} Merge {} is blocked:", cross(), pair.accent());
            for reason in reasons {
                println!("  - {}", reason.warn());
            }
        }
        MergeOutcome::NotFound => {
            println!("{} Neither {keep} nor {lose} is an active record", cross());
        }
        MergeOutcome::PartiallyFound => {
            println!(
                "{} Only one of {keep} and {lose} is an active record",
                cross()
            );
        }
        MergeOutcome::SchemaInconsistency { entries } => {
            println!("{} Configured columns missing from the schema:", cross());
            for entry in entries {
                println!("  - {}", entry.warn());
            }
        }
    }
}

/// Print the non-empty buckets of a table plan
pub fn print_plan(plan: &MergePlan) {
    if plan.is_empty() {
        println!("  {}", "No references to the losing record".muted());
        return;
    }
    for (bucket, reference) in plan.iter() {
        println!("  {} {}", format!("{bucket:<8}").muted(), reference.accent());
    }
}
