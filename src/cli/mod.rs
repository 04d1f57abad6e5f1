//! Command-line interface for catalog-minder.
//!
//! Scans, enrichment batches and catalog inspection, one subcommand each.

mod commands;

pub use commands::{Cli, Commands, run_command};
