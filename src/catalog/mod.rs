//! Catalog persistence.
//!
//! [`Catalog`] is the seam the diff engine and the enrichment orchestrator
//! talk to; [`SqliteCatalog`] is the production implementation. Every
//! method runs as a single transaction.
//!
//! # Example
//!
//! ```ignore
//! use catalog_minder::catalog::{Catalog, SqliteCatalog};
//!
//! let catalog = SqliteCatalog::open("sqlite:catalog.db").await?;
//! let tracks = catalog.all_tracks().await?;
//! ```

mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    Claim, EnrichmentOutcome, EnrichmentSummary, LibraryTrack, NewTrack, OrphanCounts,
    ResetTarget, TrackUpdate,
};

pub use sqlite::{SqliteCatalog, db_url};

/// Persistent store of [`LibraryTrack`]s.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Every track, in id order.
    async fn all_tracks(&self) -> Result<Vec<LibraryTrack>>;

    async fn track_by_id(&self, id: i64) -> Result<Option<LibraryTrack>>;

    /// Insert tracks in one transaction; returns the new ids in input order.
    /// A track whose `external_uri` is already cataloged is logged as a
    /// data-integrity problem and left out of the result; the rest of the
    /// batch still commits.
    async fn insert_batch(&self, tracks: &[NewTrack]) -> Result<Vec<i64>>;

    /// Rewrite metadata in one transaction. Enrichment columns are only
    /// touched for updates with `reset_enrichment` set.
    async fn update_batch(&self, updates: &[TrackUpdate]) -> Result<()>;

    /// Delete tracks (and their lyrics). Returns rows removed.
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64>;

    /// Remove artists, albums and genres no track references.
    async fn garbage_collect_orphans(&self) -> Result<OrphanCounts>;

    /// Tracks eligible for enrichment, oldest first: pending or failed, or
    /// resolving with an abandoned claim, and under `max_attempts`.
    async fn find_pending_enrichment(&self, max_attempts: u32, limit: u32)
    -> Result<Vec<LibraryTrack>>;

    /// Freeze failed tracks that reached `max_attempts`. Returns rows changed.
    async fn mark_exhausted(&self, max_attempts: u32) -> Result<u64>;

    /// Atomically move an eligible track to resolving and count the attempt.
    /// `None` when the track is gone or no longer eligible.
    async fn claim_for_enrichment(&self, id: i64, max_attempts: u32) -> Result<Option<Claim>>;

    /// Persist an attempt's outcome if `claim` still owns the track.
    /// Returns `false` for a stale claim; nothing is written then.
    async fn record_enrichment(&self, claim: &Claim, outcome: &EnrichmentOutcome) -> Result<bool>;

    /// Return tracks to pending with zero attempts. Returns rows changed.
    async fn reset_enrichment(&self, target: ResetTarget) -> Result<u64>;

    async fn lyrics_for(&self, id: i64) -> Result<Option<String>>;

    async fn enrichment_summary(&self) -> Result<EnrichmentSummary>;
}
