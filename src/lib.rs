//! Catalog Minder - keeps a music catalog in step with the files on disk
//! and enriches it with lyrics and cover art.
//!
//! - [`library`]: scan, reconcile and apply ([`library::CatalogSync`])
//! - [`normalizer`]: turn messy file titles into artist/title pairs
//! - [`enrichment`]: rate-limited resolution and batch enrichment
//! - [`catalog`]: the SQLite system of record

pub mod catalog;
pub mod cli;
pub mod config;
pub mod cover;
pub mod enrichment;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod normalizer;
pub mod scanner;
pub mod similarity;
pub mod status;
#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};
