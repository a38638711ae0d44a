//! ascode: import repository-defined workflows into a local project registry.
//!
//! # Usage
//!
//! ```text
//! ascode project add <key> [--group <name>=<perm>]...
//! ascode project list
//! ascode check <dir>
//! ascode import <dir> --project <key> [--name <workflow>] [--force]
//!               [--from-repository <url>] [--branch <b>] [--default-branch <b>]
//!               [--dry-run] [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, import::ImportArgs, project::ProjectCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ascode",
    version,
    about = "Sync workflows defined as code in a repository's .cds directory",
    long_about = None,
)]
struct Cli {
    /// Registry root. Defaults to ~/.ascode.
    #[arg(long, global = true, env = "ASCODE_HOME", value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage projects within the registry.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Extract and check the workflow files of a directory without importing.
    Check(CheckArgs),

    /// Import the workflow files of a directory into a project.
    Import(ImportArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => ascode_core::registry::default_root()
            .context("could not determine registry root; pass --root or set ASCODE_HOME")?,
    };
    match cli.command {
        Commands::Project { command } => commands::project::run(command, &root),
        Commands::Check(args) => args.run(),
        Commands::Import(args) => args.run(&root).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
