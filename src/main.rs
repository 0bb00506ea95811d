//! # marginalia CLI (`marg`)
//!
//! The `marg` binary drives the annotation collector: database
//! initialization, scanning configured source roots, importing single
//! files, and inspecting what has been collected.
//!
//! ## Usage
//!
//! ```bash
//! marg --config ./config/marginalia.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `marg init` | Create the SQLite database and run schema migrations |
//! | `marg sources` | List configured source roots and their health |
//! | `marg scan` | Discover and import annotation files from every enabled root |
//! | `marg import <file>` | Import a single annotation file |
//! | `marg stats` | Print database totals and a per-device breakdown |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use marginalia::{config, ingest, migrate, sources, stats};

/// marginalia — collects e-reader annotation exports from multiple devices
/// into a deduplicated per-book highlight database.
#[derive(Parser)]
#[command(
    name = "marg",
    about = "marginalia — collect e-reader highlights from device annotation exports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/marginalia.toml`. Database path, scan policy,
    /// and source roots are read from this file.
    #[arg(long, global = true, default_value = "./config/marginalia.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (books,
    /// highlights, highlight_devices, notes). Idempotent — running it
    /// multiple times is safe.
    Init,

    /// List configured source roots and their status.
    Sources,

    /// Discover and import annotation files.
    ///
    /// Walks every enabled source root (or a single `--path`), finds
    /// `metadata.*.lua` files under the per-device folders, and imports
    /// each one. Re-scanning is idempotent for highlights.
    Scan {
        /// Scan a single base directory instead of the configured roots.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Force a device label for every imported file (only with --path).
        #[arg(long, requires = "path")]
        device: Option<String>,

        /// Show discovered file counts without importing anything.
        #[arg(long)]
        dry_run: bool,

        /// Print the scan summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Import a single annotation file.
    Import {
        /// Path to a `metadata.*.lua` file.
        file: PathBuf,

        /// Device label to record for this import.
        #[arg(long, default_value = "unknown")]
        device: String,
    },

    /// Print database totals and a per-device breakdown.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Scan {
            path,
            device,
            dry_run,
            json,
        } => {
            ingest::run_scan(&cfg, path, device, dry_run, json).await?;
        }
        Commands::Import { file, device } => {
            ingest::run_import(&cfg, &file, &device).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
