//! dedupe - merge duplicate records without losing information

mod cli;

use anyhow::Result;
use auto_dedupe::types::EntityId;
use clap::{Parser, Subcommand};
use cli::context::CommandContext;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "dedupe",
    version,
    about = "Safe automatic merging of duplicate records",
    long_about = "Decides whether two records representing the same entity can be merged \
                  without losing information, and applies the merge atomically when they can."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database holding the records
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Merge configuration (default: <config dir>/auto-dedupe/merge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether LOSE can be merged into KEEP, without writing
    Plan {
        /// Surviving record
        keep: EntityId,
        /// Record merged away
        lose: EntityId,
    },
    /// Merge LOSE into KEEP if nothing would be lost
    Merge {
        /// Surviving record
        keep: EntityId,
        /// Record merged away
        lose: EntityId,
        /// Show the commands without applying them
        #[arg(long)]
        dry_run: bool,
        /// With --dry-run, print the commands as SQL
        #[arg(long, requires = "dry_run")]
        sql: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List the reference columns currently holding an id
    Locate {
        /// Record id
        id: EntityId,
    },
    /// Show the table plan and every field comparison for a pair
    Explain {
        /// Surviving record
        keep: EntityId,
        /// Record merged away
        lose: EntityId,
    },
    /// List every discovered reference column
    Catalog,
    /// Print the starter configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let json = args.json;
    let open = || CommandContext::new(args.db.as_deref(), args.config.as_deref(), json);

    let ok = match args.command {
        Commands::Plan { keep, lose } => cli::run_plan(&open().await?, keep, lose, json).await?,
        Commands::Merge {
            keep,
            lose,
            dry_run,
            sql,
            yes,
        } => {
            let options = cli::MergeOptions {
                dry_run,
                sql,
                confirm: !yes,
                json,
            };
            cli::run_merge(&open().await?, keep, lose, options).await?
        }
        Commands::Locate { id } => cli::run_locate(&open().await?, id, json).await?,
        Commands::Explain { keep, lose } => {
            cli::run_explain(&open().await?, keep, lose, json).await?
        }
        Commands::Catalog => cli::run_catalog(&open().await?, json)?,
        Commands::Config => {
            cli::run_config();
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(2) })
}
