//! Locate command - where does an id appear

use crate::cli::context::CommandContext;
use crate::cli::print_json;
use crate::cli::style::Stylize;
use anstream::println;
use auto_dedupe::error::Result;
use auto_dedupe::merge::{Bucket, table_plan};
use auto_dedupe::types::{EntityId, ReferenceColumn};
use serde::Serialize;

#[derive(Serialize)]
struct Located<'a> {
    reference: &'a ReferenceColumn,
    bucket: Bucket,
}

/// Run the locate command; `Ok(false)` when a located reference would block
pub async fn run_locate(ctx: &CommandContext, id: EntityId, json: bool) -> Result<bool> {
    let locations = ctx.engine().locate(id).await?;
    let plan = table_plan(&locations, &ctx.config.classification);

    if json {
        let located: Vec<Located<'_>> = plan
            .iter()
            .map(|(bucket, reference)| Located { reference, bucket })
            .collect();
        print_json(&located)?;
        return Ok(!plan.is_blocked());
    }

    if locations.is_empty() {
        println!("{}", format!("No references to {id}").muted());
        return Ok(true);
    }

    println!("{} {}:", "References to".emphasis(), id.accent());
    for (bucket, reference) in plan.iter() {
        let label = format!("{bucket:<8}");
        let label = if bucket == Bucket::Blocker {
            label.warn()
        } else {
            label.muted()
        };
        println!("  {label} {}", reference.accent());
    }

    Ok(!plan.is_blocked())
}
