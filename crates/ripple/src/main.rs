//! Ripple CLI - blast-radius analysis from the command line.
//!
//! Ripple builds a dependency graph of a repository, versions file content
//! against commits, and estimates the risk of modifying, deleting or moving
//! a file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::display::{ChangeArg, OutputMode};

/// Ripple: versioned dependency graphs and change-impact analysis.
#[derive(Parser)]
#[command(name = "ripple")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the working tree (reuses the snapshot of an unchanged commit)
    Analyze {
        /// Remote URL identifying the repository
        #[arg(long)]
        url: Option<String>,
    },

    /// Estimate the blast radius of changing a file
    Impact {
        /// File path (relative, absolute or bare filename)
        file: String,

        /// Kind of change to simulate
        #[arg(short, long, value_enum, default_value_t = ChangeArg::Modify)]
        change: ChangeArg,

        /// Ask the explanation service to describe the impact
        #[arg(long)]
        explain: bool,

        /// Show the dependency chain behind each dependent
        #[arg(long)]
        why: bool,
    },

    /// Show the recorded versions of a file
    History {
        /// File path
        file: String,
    },

    /// Compare a file on disk with its latest recorded version
    Integrity {
        /// File path
        file: String,
    },

    /// List analysis snapshots
    Snapshots {
        /// Delete the snapshot with this id or commit prefix
        #[arg(long, value_name = "SNAPSHOT")]
        delete: Option<String>,
    },

    /// Compare two snapshots (by id, id prefix or commit prefix)
    Compare {
        /// Older snapshot
        before: String,
        /// Newer snapshot
        after: String,
    },

    /// Detect circular dependencies
    Cycles,

    /// Show what calls a function
    Callers {
        /// Function name
        function: String,

        /// Include callers of callers
        #[arg(short, long)]
        transitive: bool,

        /// Hops to follow with --transitive
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
    },

    /// Show architectural claims with their confidence
    Confidence,

    /// Record commits and file versions from version control history
    ImportHistory {
        /// Number of commits to walk (defaults to `history-depth`)
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// List registered repositories
    Repos {
        /// Delete the repository with this id
        #[arg(long, value_name = "REPO_ID")]
        delete: Option<String>,
    },

    /// Show per-author activity
    Contributors,

    /// Show lineage counts and the latest snapshot
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let workspace = match cli.workspace {
        Some(w) => w,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };
    let output = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let result = match cli.command {
        Commands::Analyze { url } => cli::analyze::run(&workspace, url, output),
        Commands::Impact {
            file,
            change,
            explain,
            why,
        } => cli::impact::run(&workspace, &file, change.into(), explain, why, output),
        Commands::History { file } => cli::history::run(&workspace, &file, output),
        Commands::Integrity { file } => cli::integrity::run(&workspace, &file, output),
        Commands::Snapshots { delete } => cli::snapshots::run(&workspace, delete.as_deref(), output),
        Commands::Compare { before, after } => {
            cli::compare::run(&workspace, &before, &after, output)
        }
        Commands::Cycles => cli::cycles::run(&workspace, output),
        Commands::Callers {
            function,
            transitive,
            depth,
        } => cli::callers::run(&workspace, &function, transitive, depth, output),
        Commands::Confidence => cli::confidence::run(&workspace, output),
        Commands::ImportHistory { max } => cli::import_history::run(&workspace, max, output),
        Commands::Repos { delete } => cli::repos::run(&workspace, delete.as_deref(), output),
        Commands::Contributors => cli::contributors::run(&workspace, output),
        Commands::Status => cli::status::run(&workspace, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {cause}", "caused by".dimmed());
            }
            ExitCode::FAILURE
        }
    }
}
