#![forbid(unsafe_code)]

mod cmd;
mod output;

use blocklist_core::config::resolve_config;
use blocklist_core::ErrorCode;
use clap::{Parser, Subcommand};
use cmd::Context;
use output::{CliError, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "blk: directed user blocks with a consistent membership cache",
    long_about = None
)]
struct Cli {
    /// Log at debug level (ignored when `BLOCKLIST_LOG` is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Database file (defaults to `store.path` from the config).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (defaults to ./blocklist.toml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Mutate",
        about = "Make A block B",
        after_help = "EXAMPLES:\n    # 1 blocks 2\n    blk block 1 2\n\n    # Emit machine-readable output\n    blk block 1 2 --json"
    )]
    Block(cmd::block::PairArgs),

    #[command(
        next_help_heading = "Mutate",
        about = "Remove A's block on B",
        after_help = "EXAMPLES:\n    blk unblock 1 2"
    )]
    Unblock(cmd::block::PairArgs),

    #[command(
        next_help_heading = "Mutate",
        about = "Flip whether A blocks B",
        after_help = "EXAMPLES:\n    # Blocks if not blocking, unblocks otherwise\n    blk toggle 1 2"
    )]
    Toggle(cmd::block::PairArgs),

    #[command(
        next_help_heading = "Read",
        about = "Membership answers for one pair",
        after_help = "EXAMPLES:\n    blk check 1 2"
    )]
    Check(cmd::block::PairArgs),

    #[command(
        next_help_heading = "Read",
        about = "List who a user blocks, or who blocks them",
        after_help = "EXAMPLES:\n    # Everyone 1 blocks\n    blk list 1\n\n    # Who blocks 1, ten at a time\n    blk list 1 --direction blockers --page-size 10\n\n    # Continue from a cursor\n    blk list 1 --page-size 10 --after 57"
    )]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Read", about = "Count blocking and blockers")]
    Count(cmd::list::SubjectArgs),

    #[command(next_help_heading = "Read", about = "Both directional lists for a user")]
    Summary(cmd::list::SubjectArgs),

    #[command(
        next_help_heading = "Read",
        about = "Edges involving a user, or between two users",
        after_help = "EXAMPLES:\n    # Every edge touching 1\n    blk relations 1\n\n    # Edges between 1 and 2\n    blk relations 1 2"
    )]
    Relations(cmd::relations::RelationsArgs),

    #[command(next_help_heading = "Cache", about = "Manage membership cache entries")]
    Cache(cmd::cache::CacheArgs),

    #[command(next_help_heading = "Maintenance", about = "Show database and configuration")]
    Info,
}

/// Filter used when `BLOCKLIST_LOG` is unset.
const fn default_filter(verbose: bool, debug_env: bool) -> &'static str {
    if verbose || debug_env {
        "blocklist=debug,info"
    } else {
        "blocklist=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BLOCKLIST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(verbose, env::var("DEBUG").is_ok()))
    });

    let format = env::var("BLOCKLIST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        debug!("verbose logging enabled");
    }

    let project_root = env::current_dir()?;
    let output = resolve_output_mode(cli.json);

    let config = match resolve_config(&project_root, cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                output,
                &CliError {
                    message: format!("{err:#}"),
                    suggestion: ErrorCode::ConfigParseError.hint().map(str::to_string),
                    error_code: Some(ErrorCode::ConfigParseError.code().to_string()),
                },
            )?;
            return Err(err);
        }
    };

    let ctx = Context {
        db_path: cmd::resolve_db_path(&project_root, cli.db.as_deref(), &config),
        config,
        output,
    };

    match &cli.command {
        Commands::Block(args) => cmd::block::run_mutation(cmd::block::Mutation::Block, args, &ctx),
        Commands::Unblock(args) => {
            cmd::block::run_mutation(cmd::block::Mutation::Unblock, args, &ctx)
        }
        Commands::Toggle(args) => {
            cmd::block::run_mutation(cmd::block::Mutation::Toggle, args, &ctx)
        }
        Commands::Check(args) => cmd::check::run_check(args, &ctx),
        Commands::List(args) => cmd::list::run_list(args, &ctx),
        Commands::Count(args) => cmd::list::run_count(args, &ctx),
        Commands::Summary(args) => cmd::list::run_summary(args, &ctx),
        Commands::Relations(args) => cmd::relations::run_relations(args, &ctx),
        Commands::Cache(args) => cmd::cache::run_cache(args, &ctx),
        Commands::Info => cmd::info::run_info(&ctx),
    }
}
