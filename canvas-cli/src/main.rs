//! Canvas: project registry CLI over a local data root.
//!
//! # Usage
//!
//! ```text
//! canvas [--root <dir>] user add <id>
//! canvas [--root <dir>] user list
//! canvas [--root <dir>] project create <name> --as <user> [--description ..] [--meta k=v]...
//! canvas [--root <dir>] project list --as <user> [--owner <user>] [--json]
//! canvas [--root <dir>] project show <id> --as <user> [--json]
//! canvas [--root <dir>] project update <id> --as <user> [--name ..] [--description ..] [--meta k=v]...
//! canvas [--root <dir>] project delete <id> --as <user>
//! canvas [--root <dir>] project by-node <node> [--as <user>] [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use canvas_store::{paths, Store};
use commands::{project::ProjectCommand, user::UserCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "canvas",
    version,
    about = "Manage projects, their root nodes and storage folders",
    long_about = None,
)]
struct Cli {
    /// Data root. Defaults to ~/.canvas
    #[arg(long, global = true, env = "CANVAS_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage known user identities.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Create, inspect, update and delete projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let root = match cli.root {
        Some(root) => root,
        None => paths::default_root().context("cannot locate data root; pass --root")?,
    };
    tracing::debug!(root = %root.display(), "opening data root");
    let store = Store::open_at(&root);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(async move {
        match cli.command {
            Commands::User { command } => commands::user::run(&store, command).await,
            Commands::Project { command } => commands::project::run(&store, command).await,
        }
    })
}

/// Logs go to stderr so `--json` output stays machine-readable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
