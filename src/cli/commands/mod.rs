//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `scan`: reconcile the catalog with the library folders
//! - `enrich`: run an enrichment batch against Genius
//! - `catalog`: status, reset and listing
//! - `parse`: try the title normalizer on a string

mod catalog;
mod enrich;
mod parse;
mod scan;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::catalog::{SqliteCatalog, db_url};
use crate::config::{self, Config};
use crate::enrichment::TriggerReason;
use crate::status::StatusBoard;

pub use catalog::{cmd_list, cmd_reset, cmd_status};
pub use enrich::cmd_enrich;
pub use parse::cmd_parse;
pub use scan::cmd_scan;

/// Catalog Minder CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog database file (overrides the config file)
    #[arg(long, global = true, env = "CATALOG_MINDER_DB")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the catalog with the files on disk
    Scan {
        /// Directories to scan (defaults to the configured library paths)
        paths: Vec<PathBuf>,
        /// Run a post-scan enrichment batch afterwards
        #[arg(long)]
        enrich: bool,
        /// Genius API token (or set GENIUS_ACCESS_TOKEN env var)
        #[arg(long, env = "GENIUS_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Enrich pending tracks with lyrics and cover art
    Enrich {
        /// Tracks to process (defaults to the batch size for --reason)
        #[arg(short, long)]
        limit: Option<u32>,
        /// What triggered this run; selects the default batch size
        #[arg(long, value_enum, default_value_t = TriggerReason::Manual)]
        reason: TriggerReason,
        /// Genius API token (or set GENIUS_ACCESS_TOKEN env var)
        #[arg(long, env = "GENIUS_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Show track counts per enrichment status
    Status,
    /// Return tracks to pending with a fresh attempt budget
    Reset {
        /// Track ids to reset (default: every exhausted track)
        #[arg(long, num_args = 1..)]
        ids: Vec<i64>,
    },
    /// List all tracks in the catalog
    List {
        /// Print the stored lyrics of one track instead
        #[arg(long)]
        lyrics: Option<i64>,
    },
    /// Show how a raw title would be normalized
    Parse {
        /// Raw title, e.g. "Queen - Bohemian Rhapsody (Official Video)"
        title: String,
        /// Artist tag, if the file has one
        #[arg(long)]
        artist: Option<String>,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = config::load();

    if let Commands::Parse { title, artist } = &cli.command {
        return cmd_parse(&config, title, artist.as_deref());
    }

    let rt = Runtime::new()?;
    rt.block_on(async {
        let ctx = AppContext::open(config, cli.database.as_deref()).await?;
        match cli.command {
            Commands::Scan {
                paths,
                enrich,
                token,
            } => cmd_scan(&ctx, paths, enrich, token).await,
            Commands::Enrich {
                limit,
                reason,
                token,
            } => cmd_enrich(&ctx, limit, reason, token).await,
            Commands::Status => cmd_status(&ctx).await,
            Commands::Reset { ids } => cmd_reset(&ctx, ids).await,
            Commands::List { lyrics } => cmd_list(&ctx, lyrics).await,
            Commands::Parse { .. } => Ok(()),
        }
    })
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Everything a command needs: settings, the open catalog, the status board.
pub(crate) struct AppContext {
    pub config: Config,
    pub catalog: SqliteCatalog,
    pub status: Arc<StatusBoard>,
}

impl AppContext {
    async fn open(config: Config, database: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let path = database
            .map(PathBuf::from)
            .or_else(|| config.library.database.clone())
            .unwrap_or_else(config::default_database_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let catalog = SqliteCatalog::open(&db_url(Some(&path)))
            .await
            .with_context(|| format!("opening catalog {}", path.display()))?
            .with_stale_claim_after(std::time::Duration::from_secs(
                config.enrichment.stale_claim_secs,
            ));

        Ok(Self {
            config,
            catalog,
            status: Arc::new(StatusBoard::new()),
        })
    }

    /// Token from the command line, else from the config file.
    pub fn token(&self, cli_token: Option<String>) -> Option<String> {
        cli_token
            .or_else(|| self.config.credentials.genius_access_token.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

/// A token cancelled on Ctrl+C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current step...");
            token.cancel();
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_enrich() {
        let cli = Cli::try_parse_from([
            "catalog-minder",
            "enrich",
            "--limit",
            "5",
            "--reason",
            "post-scan",
        ])
        .unwrap();
        match cli.command {
            Commands::Enrich { limit, reason, .. } => {
                assert_eq!(limit, Some(5));
                assert_eq!(reason, TriggerReason::PostScan);
            }
            _ => panic!("expected enrich"),
        }
    }

    #[test]
    fn test_cli_parses_reset_ids() {
        let cli = Cli::try_parse_from(["catalog-minder", "reset", "--ids", "3", "7"]).unwrap();
        match cli.command {
            Commands::Reset { ids } => assert_eq!(ids, vec![3, 7]),
            _ => panic!("expected reset"),
        }
    }

    #[test]
    fn test_global_database_flag() {
        let cli = Cli::try_parse_from(["catalog-minder", "status", "--database", "/tmp/x.db"])
            .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
    }
}
