//! Explain command - everything the engine looks at for a pair

use crate::cli::context::CommandContext;
use crate::cli::plan::print_plan;
use crate::cli::print_json;
use crate::cli::style::{Stylize, cross};
use anstream::println;
use auto_dedupe::error::Result;
use auto_dedupe::merge::ColumnComparison;
use auto_dedupe::types::EntityId;

/// Run the explain command; `Ok(false)` when anything blocks
pub async fn run_explain(
    ctx: &CommandContext,
    keep: EntityId,
    lose: EntityId,
    json: bool,
) -> Result<bool> {
    let explanation = ctx.engine().explain(keep, lose).await?;
    let clean = explanation.active == 2
        && !explanation.plan.is_blocked()
        && explanation.examined.iter().all(|pair| {
            pair.comparisons
                .as_ref()
                .is_some_and(|c| c.iter().all(|col| !col.blocks))
        });

    if json {
        print_json(&explanation)?;
        return Ok(clean);
    }

    println!(
        "{} keep {} / lose {} ({} of 2 active)",
        "Explain".emphasis(),
        keep.accent(),
        lose.accent(),
        explanation.active
    );
    println!();
    println!("{}:", "Table plan".emphasis());
    print_plan(&explanation.plan);

    for pair in &explanation.examined {
        println!();
        println!("{} {}:", "Examine".emphasis(), pair.location.accent());
        match &pair.comparisons {
            Some(comparisons) => print_comparisons(comparisons),
            None => println!(
                "  {} table {} has no column behaviors configured",
                cross(),
                pair.location.table.warn()
            ),
        }
    }

    Ok(clean)
}

fn print_comparisons(comparisons: &[ColumnComparison]) {
    let width = comparisons.iter().map(|c| c.column.len()).max().unwrap_or(0);
    for c in comparisons {
        let line = format!(
            "{:<width$}  {:<28}  {:?} / {:?}",
            c.column,
            c.behavior,
            c.kept.as_text(),
            c.lost.as_text()
        );
        if c.blocks {
            println!("  {} {}", cross(), line.warn());
        } else {
            println!("    {}", line.muted());
        }
    }
}
