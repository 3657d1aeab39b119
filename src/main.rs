//! # neat CLI
//!
//! The `neat` binary lists and imports document packages.
//!
//! ## Usage
//!
//! ```bash
//! neat --config ./config/neat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `neat show <path>` | List package directories and their files |
//! | `neat import <path>` | Import every package into the catalog |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`). Command output goes to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use neat_sync::config::{self, Config};
use neat_sync::{import, show};

/// Imports scanned document packages into a CKAN-style data catalog.
#[derive(Parser)]
#[command(name = "neat", version, arg_required_else_help = true)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// `show` and `import --dry-run` fall back to built-in defaults when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/neat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List package directories and their files without importing.
    Show {
        /// Directory containing one subdirectory per package.
        path: PathBuf,
    },

    /// Import every package directory into the catalog.
    ///
    /// Failures are isolated per package; the command exits non-zero
    /// when any package failed.
    Import {
        /// Directory containing one subdirectory per package.
        path: PathBuf,

        /// Reconcile against an in-memory catalog instead of the configured one.
        ///
        /// The in-memory catalog starts empty, so every package is reported
        /// as `created` even when the remote catalog already holds it.
        #[arg(long)]
        dry_run: bool,

        /// Import at most this many packages.
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file, or defaults when it is absent.
fn load_or_minimal(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Show { path } => {
            let cfg = load_or_minimal(&cli.config)?;
            show::run_show(&cfg, &path)?;
        }
        Commands::Import {
            path,
            dry_run,
            limit,
        } => {
            let cfg = if dry_run {
                load_or_minimal(&cli.config)?
            } else {
                config::load_config(&cli.config)?
            };
            import::run_import(&cfg, &path, dry_run, limit).await?;
        }
    }

    Ok(())
}
