//! Cover art storage.
//!
//! Remote cover images are downloaded once and kept on disk under a name
//! derived from their URL, so a re-enrichment never downloads twice.

mod cache;

pub use cache::CoverCache;
