//! Merge command - merge a duplicate into its survivor

use crate::cli::context::CommandContext;
use crate::cli::plan::print_outcome;
use crate::cli::print_json;
use crate::cli::style::{Stylize, check, cross};
use anstream::println;
use auto_dedupe::error::{Error, Result};
use auto_dedupe::merge::{
    CommandBatch, ExecutionOutcome, MergeExecutionResult, MergeOutcome, execute_confirmed,
    execute_merge,
};
use auto_dedupe::store::sql;
use auto_dedupe::types::EntityId;
use dialoguer::Confirm;

/// Options for the merge command
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Dry run - show the commands without applying them
    pub dry_run: bool,
    /// Render the dry-run commands as SQL
    pub sql: bool,
    /// Prompt for confirmation before applying
    pub confirm: bool,
    /// JSON output
    pub json: bool,
}

/// Run the merge command; `Ok(true)` when the merge was applied (or, for a
/// dry run, would be)
pub async fn run_merge(
    ctx: &CommandContext,
    keep: EntityId,
    lose: EntityId,
    options: MergeOptions,
) -> Result<bool> {
    if options.json && options.confirm && !options.dry_run {
        return Err(Error::Config(
            "--json cannot prompt; pass --yes or --dry-run".to_string(),
        ));
    }

    // =========================================================================
    // Phase 1+2: GATHER and PLAN - read-only
    // =========================================================================

    let outcome = ctx.engine().plan_merge(keep, lose).await?;

    let MergeOutcome::Ready { batch, .. } = &outcome else {
        if options.json {
            print_json(&MergeExecutionResult {
                outcome: outcome.clone(),
                execution: None,
            })?;
        } else {
            print_outcome(&outcome, keep, lose);
        }
        return Ok(false);
    };

    if options.dry_run {
        if options.json {
            print_json(&outcome)?;
        } else {
            print_outcome(&outcome, keep, lose);
            println!();
            report_commands(batch, options.sql)?;
            println!();
            println!("{}", "Run without --dry-run to execute.".muted());
        }
        return Ok(true);
    }

    if options.confirm {
        print_outcome(&outcome, keep, lose);
        println!();
        report_commands(batch, false)?;
        println!();
        if !Confirm::new()
            .with_prompt(format!("Merge {lose} into {keep}?"))
            .default(false)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(false);
        }
    }

    // =========================================================================
    // Phase 3: EXECUTE - one transaction, existence re-checked inside it
    // =========================================================================

    let result = if options.confirm {
        // The prompt may have been open for a while; apply only the plan shown
        execute_confirmed(
            &ctx.engine(),
            &ctx.store,
            Some(&ctx.store),
            &outcome,
            keep,
            lose,
        )
        .await?
    } else {
        MergeExecutionResult {
            outcome: outcome.clone(),
            execution: Some(execute_merge(batch, &ctx.store, Some(&ctx.store)).await),
        }
    };

    if options.json {
        print_json(&result)?;
    } else {
        print_merge_summary(&result, keep, lose);
    }

    Ok(result.is_success())
}

/// Print each command, as text or SQL
fn report_commands(batch: &CommandBatch, as_sql: bool) -> Result<()> {
    println!("{}:", "Commands".emphasis());
    if as_sql {
        for stmt in sql::batch(batch)? {
            println!("  {stmt}");
        }
    } else {
        for (i, command) in batch.commands.iter().enumerate() {
            println!("  {}. {command}", i + 1);
        }
    }
    Ok(())
}

/// Print merge summary
fn print_merge_summary(result: &MergeExecutionResult, keep: EntityId, lose: EntityId) {
    match &result.execution {
        Some(ExecutionOutcome::Applied { rows_affected }) => {
            println!(
                "{} Merged {} into {} ({} rows)",
                check(),
                lose.accent(),
                keep.accent(),
                rows_affected
            );
        }
        Some(ExecutionOutcome::Failed { reason }) => {
            println!("{} Merge failed; nothing was changed", cross());
            println!("  {}", reason.muted());
        }
        None => print_outcome(&result.outcome, keep, lose),
    }
}
