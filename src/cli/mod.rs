//! CLI command implementations

mod catalog;
pub mod context;
mod explain;
mod locate;
mod merge;
mod plan;
pub mod style;

pub use catalog::run_catalog;
pub use explain::run_explain;
pub use locate::run_locate;
pub use merge::{MergeOptions, run_merge};
pub use plan::run_plan;

use auto_dedupe::config::MergeConfig;
use auto_dedupe::error::{Error, Result};
use serde::Serialize;

/// Print a value as pretty JSON on stdout
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Internal(format!("failed to serialize output: {e}")))?;
    anstream::println!("{text}");
    Ok(())
}

/// Print the starter configuration
pub fn run_config() {
    anstream::print!("{}", MergeConfig::template());
}
