//! # Content Indexer CLI (`cidx`)
//!
//! The `cidx` binary reconciles a Markdown content directory with an
//! Algolia index, either on demand or behind a webhook.
//!
//! ## Usage
//!
//! ```bash
//! cidx --config ./config/cidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cidx sync` | Reconcile the remote index with local content |
//! | `cidx records` | List the records extracted from local content |
//! | `cidx status` | Show remote index statistics |
//! | `cidx report` | Show the last run report |
//! | `cidx serve` | Start the webhook server |
//!
//! ## Examples
//!
//! ```bash
//! # Preview changes without touching the index
//! cidx sync --dry-run
//!
//! # Sync from CI and fail the job on any error
//! cidx sync --fail-on-error
//!
//! # Dump extracted records as JSON
//! cidx records --json
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use content_indexer::config::{self, Config};
use content_indexer::{records, report, server, status, sync};

/// Content Indexer CLI. Keeps an Algolia index in step with a Markdown
/// content directory.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cidx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cidx",
    about = "Content Indexer: reconcile an Algolia index with Markdown content",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cidx.toml`. When the default file is absent the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/cidx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Reconcile the remote index with local content.
    ///
    /// Fetches remote ids, extracts local records, applies index settings,
    /// deletes stale records and upserts current ones. The outcome is
    /// written to the report file.
    Sync {
        /// Show what would change without writing to the index.
        #[arg(long)]
        dry_run: bool,

        /// Exit non-zero when the run reports a failure.
        #[arg(long)]
        fail_on_error: bool,
    },

    /// List the records extracted from local content.
    Records {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show remote index statistics.
    Status,

    /// Show the last run report.
    Report,

    /// Start the webhook server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Sync {
            dry_run,
            fail_on_error,
        } => {
            sync::run_sync(&cfg, dry_run, fail_on_error).await?;
        }
        Commands::Records { json } => {
            records::run_records(&cfg, json)?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Report => match report::read_report(&cfg.report.path)? {
            Some(last) => println!("{}", serde_json::to_string_pretty(&last)?),
            None => println!("No report at {}.", cfg.report.path.display()),
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// An explicit config path must exist; the default path may be absent.
fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new("./config/cidx.toml") {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    Ok(config::load_config(path)?)
}
