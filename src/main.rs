//! Catalog Minder command-line entry point.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use catalog_minder::cli;

/// Log filter when `RUST_LOG` is unset. Events use short module targets.
const DEFAULT_FILTER: &str = "catalog_minder=info,scan=info,catalog=info,resolver=info,enrichment=info";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .init();

    cli::run_command(args)
}
