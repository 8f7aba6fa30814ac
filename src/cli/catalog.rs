//! Catalog command - discovered reference columns

use crate::cli::context::CommandContext;
use crate::cli::print_json;
use crate::cli::style::Stylize;
use anstream::println;
use auto_dedupe::error::Result;

/// Run the catalog command
pub fn run_catalog(ctx: &CommandContext, json: bool) -> Result<bool> {
    if json {
        print_json(ctx.catalog.reference_columns())?;
        return Ok(true);
    }

    let classification = &ctx.config.classification;
    println!(
        "{} ({} tables scanned)",
        "Reference columns".emphasis(),
        ctx.catalog.tables().count()
    );
    for reference in ctx.catalog.reference_columns() {
        let bucket = classification
            .bucket_of(&reference.key())
            .map_or_else(|| "unclassified".warn(), |b| b.to_string().muted());
        println!("  {} {}", reference.accent(), bucket);
    }
    Ok(true)
}
