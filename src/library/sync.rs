//! Applying a [`ReconcilePlan`] to the catalog.
//!
//! Inserts and updates are written in chunks of `batch_size`, one
//! transaction each. A failed chunk is logged and recorded in the
//! [`ScanReport`]; the remaining chunks still run. Cancellation is checked
//! between chunks, so committed work is never rolled back by a cancel.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::diff::{ReconcilePlan, reconcile};
use super::lock::ScanLock;
use crate::catalog::Catalog;
use crate::error::{Error, ErrorKind, Result};
use crate::model::{LibraryTrack, NewTrack, ObservedFile, OrphanCounts, TrackUpdate};
use crate::normalizer::TitleNormalizer;
use crate::scanner::FileObserver;
use crate::status::StatusBoard;

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub observed: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Updates whose title/artist were re-derived
    pub renormalized: usize,
    pub deleted: u64,
    pub unchanged: usize,
    pub duplicates: usize,
    /// New files left out because their tags could not be read
    pub unreadable: usize,
    /// Inserts dropped because the URI was already cataloged
    pub rejected: usize,
    pub orphans: OrphanCounts,
    /// One message per chunk that failed to commit
    pub failed_batches: Vec<String>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Keeps the catalog in step with a [`FileObserver`].
pub struct CatalogSync {
    catalog: Arc<dyn Catalog>,
    normalizer: Arc<TitleNormalizer>,
    lock: ScanLock,
    batch_size: usize,
    status: Arc<StatusBoard>,
}

impl CatalogSync {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        normalizer: Arc<TitleNormalizer>,
        lock: ScanLock,
        batch_size: usize,
    ) -> Self {
        Self {
            catalog,
            normalizer,
            lock,
            batch_size: batch_size.max(1),
            status: Arc::new(StatusBoard::new()),
        }
    }

    /// Report into a shared status board.
    pub fn with_status(mut self, status: Arc<StatusBoard>) -> Self {
        self.status = status;
        self
    }

    /// Enumerate, reconcile and apply, holding the scan lock throughout.
    ///
    /// Fails immediately with [`Error::ScanInProgress`] if another scan
    /// holds the lock.
    pub async fn run_scan(
        &self,
        observer: Arc<dyn FileObserver>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let _guard = self.lock.acquire()?;
        let started = Instant::now();
        self.status.set_scanning(true);

        let result = self.scan_locked(observer, cancel).await;
        self.status.set_scanning(false);

        let mut report = result.inspect_err(|e| self.status.record_error(e.to_string()))?;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.status.record_scan(&report);

        tracing::info!(
            target: "scan",
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            rejected = report.rejected,
            unreadable = report.unreadable,
            failed_batches = report.failed_batches.len(),
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed_ms,
            "Scan complete"
        );
        Ok(report)
    }

    async fn scan_locked(
        &self,
        observer: Arc<dyn FileObserver>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let observed = tokio::task::spawn_blocking(move || observer.list_audio_files())
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        if cancel.is_cancelled() {
            return Ok(ScanReport {
                observed: observed.len(),
                cancelled: true,
                ..Default::default()
            });
        }

        let persisted = self.catalog.all_tracks().await?;
        let observed_count = observed.len();
        let plan = reconcile(observed, persisted);
        tracing::debug!(
            target: "scan",
            to_insert = plan.to_insert.len(),
            to_update = plan.to_update.len(),
            to_delete = plan.to_delete.len(),
            "Plan ready"
        );

        let mut report = self.apply(plan, cancel).await?;
        report.observed = observed_count;
        Ok(report)
    }

    /// Write a plan to the catalog.
    ///
    /// Only a permission failure aborts; any other chunk failure is
    /// recorded and skipped.
    pub async fn apply(&self, plan: ReconcilePlan, cancel: &CancellationToken) -> Result<ScanReport> {
        let mut report = ScanReport {
            unchanged: plan.unchanged.len(),
            duplicates: plan.duplicates.len(),
            unreadable: plan.unreadable.len(),
            ..Default::default()
        };

        let inserts: Vec<NewTrack> = plan.to_insert.iter().map(|f| self.prepare_insert(f)).collect();
        for (n, chunk) in inserts.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            match self.catalog.insert_batch(chunk).await {
                Ok(ids) => {
                    report.inserted += ids.len();
                    report.rejected += chunk.len() - ids.len();
                }
                Err(e) => record_failure(&mut report, format!("insert batch {}", n + 1), e)?,
            }
        }

        let updates: Vec<TrackUpdate> = plan
            .to_update
            .iter()
            .map(|(track, file)| self.prepare_update(track, file))
            .collect();
        for (n, chunk) in updates.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            match self.catalog.update_batch(chunk).await {
                Ok(()) => {
                    report.updated += chunk.len();
                    report.renormalized += chunk.iter().filter(|u| u.renormalized).count();
                }
                Err(e) => record_failure(&mut report, format!("update batch {}", n + 1), e)?,
            }
        }

        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }
        if !plan.to_delete.is_empty() {
            match self.catalog.delete_by_ids(&plan.to_delete).await {
                Ok(deleted) => report.deleted = deleted,
                Err(e) => record_failure(&mut report, "delete batch".to_string(), e)?,
            }
        }

        match self.catalog.garbage_collect_orphans().await {
            Ok(orphans) => report.orphans = orphans,
            Err(e) => record_failure(&mut report, "orphan cleanup".to_string(), e)?,
        }

        Ok(report)
    }

    /// Normalize a new file into a catalog row.
    pub fn prepare_insert(&self, file: &ObservedFile) -> NewTrack {
        let parsed = self.normalizer.parse(&file.raw_title, file.raw_artist.as_deref());
        NewTrack {
            external_uri: file.external_uri.clone(),
            title: parsed.title,
            artist: parsed.artist,
            album: self.clean(file.raw_album.as_deref()),
            genre: self.clean(file.raw_genre.as_deref()),
            version_tag: parsed.version_tag,
            duration_secs: duration_secs(file.duration_ms),
            year: file.year,
            track_number: file.track_number,
            last_modified: file.last_modified,
            raw_title: file.raw_title.clone(),
            raw_artist: file.raw_artist.clone(),
            raw_album: file.raw_album.clone(),
        }
    }

    /// Refresh a changed file's row. Title and artist are only re-derived
    /// when their raw inputs changed; enrichment is reset only when that
    /// changes the result.
    pub fn prepare_update(&self, track: &LibraryTrack, file: &ObservedFile) -> TrackUpdate {
        let renormalized = track.raw_title != file.raw_title || track.raw_artist != file.raw_artist;

        let (title, artist, version_tag) = if renormalized {
            let parsed = self.normalizer.parse(&file.raw_title, file.raw_artist.as_deref());
            (parsed.title, parsed.artist, parsed.version_tag)
        } else {
            (track.title.clone(), track.artist.clone(), track.version_tag.clone())
        };
        let reset_enrichment = renormalized && (title != track.title || artist != track.artist);

        let album = if track.raw_album != file.raw_album {
            self.clean(file.raw_album.as_deref())
        } else {
            track.album.clone()
        };

        TrackUpdate {
            id: track.id,
            track: NewTrack {
                external_uri: file.external_uri.clone(),
                title,
                artist,
                album,
                genre: self.clean(file.raw_genre.as_deref()),
                version_tag,
                duration_secs: duration_secs(file.duration_ms),
                year: file.year,
                track_number: file.track_number,
                last_modified: file.last_modified,
                raw_title: file.raw_title.clone(),
                raw_artist: file.raw_artist.clone(),
                raw_album: file.raw_album.clone(),
            },
            renormalized,
            reset_enrichment,
        }
    }

    fn clean(&self, raw: Option<&str>) -> Option<String> {
        raw.and_then(|r| self.normalizer.clean_field(r))
    }
}

fn duration_secs(duration_ms: u64) -> i64 {
    ((duration_ms + 500) / 1000) as i64
}

fn record_failure(report: &mut ScanReport, what: String, error: Error) -> Result<()> {
    if error.kind() == ErrorKind::PermissionDenied {
        return Err(error.context(what));
    }
    tracing::warn!(target: "scan", batch = %what, error = %error, "Batch failed, continuing");
    report.failed_batches.push(format!("{what}: {error}"));
    Ok(())
}
