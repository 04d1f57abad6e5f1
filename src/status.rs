//! Aggregate counters and the last error, for display.
//!
//! Scans and enrichment batches report here when they finish; the CLI
//! (or any UI) reads a [`StatusSnapshot`]. Writes are rare and short, so a
//! parking_lot `RwLock` is enough.

use parking_lot::RwLock;

use crate::enrichment::BatchResult;
use crate::library::ScanReport;
use crate::model::now_millis;

/// Point-in-time copy of the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub scanning: bool,
    pub enriching: bool,
    pub scans_completed: u64,
    pub tracks_inserted: u64,
    pub tracks_updated: u64,
    pub tracks_deleted: u64,
    pub batches_completed: u64,
    pub tracks_enriched: u64,
    pub tracks_partial: u64,
    pub tracks_failed: u64,
    pub last_scan_at: Option<i64>,
    pub last_batch_at: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: RwLock<StatusSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    pub fn set_scanning(&self, scanning: bool) {
        self.inner.write().scanning = scanning;
    }

    pub fn set_enriching(&self, enriching: bool) {
        self.inner.write().enriching = enriching;
    }

    pub fn record_scan(&self, report: &ScanReport) {
        let mut status = self.inner.write();
        status.scanning = false;
        status.scans_completed += 1;
        status.tracks_inserted += report.inserted as u64;
        status.tracks_updated += report.updated as u64;
        status.tracks_deleted += report.deleted;
        status.last_scan_at = Some(now_millis());
        if let Some(failure) = report.failed_batches.last() {
            status.last_error = Some(failure.clone());
        }
    }

    pub fn record_batch(&self, result: &BatchResult) {
        let mut status = self.inner.write();
        status.enriching = false;
        status.batches_completed += 1;
        status.tracks_enriched += u64::from(result.enriched);
        status.tracks_partial += u64::from(result.partial);
        status.tracks_failed += u64::from(result.failed);
        status.last_batch_at = Some(now_millis());
    }

    /// Remember an error message for the user.
    pub fn record_error(&self, message: impl Into<String>) {
        self.inner.write().last_error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.inner.write().last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_counters_accumulate() {
        let board = StatusBoard::new();
        board.set_scanning(true);
        assert!(board.snapshot().scanning);

        let report = ScanReport {
            inserted: 3,
            updated: 1,
            deleted: 2,
            ..Default::default()
        };
        board.record_scan(&report);
        board.record_scan(&report);

        let snapshot = board.snapshot();
        assert!(!snapshot.scanning);
        assert_eq!(snapshot.scans_completed, 2);
        assert_eq!(snapshot.tracks_inserted, 6);
        assert_eq!(snapshot.tracks_deleted, 4);
        assert!(snapshot.last_scan_at.is_some());
    }

    #[test]
    fn test_batch_counters() {
        let board = StatusBoard::new();
        board.record_batch(&BatchResult {
            enriched: 2,
            partial: 1,
            failed: 1,
            ..Default::default()
        });
        let snapshot = board.snapshot();
        assert_eq!(snapshot.batches_completed, 1);
        assert_eq!(snapshot.tracks_enriched, 2);
        assert_eq!(snapshot.tracks_failed, 1);
    }

    #[test]
    fn test_last_error() {
        let board = StatusBoard::new();
        board.record_error("search token rejected");
        assert_eq!(
            board.snapshot().last_error.as_deref(),
            Some("search token rejected")
        );
        board.clear_error();
        assert_eq!(board.snapshot().last_error, None);

        let report = ScanReport {
            failed_batches: vec!["insert batch 2: database is locked".to_string()],
            ..Default::default()
        };
        board.record_scan(&report);
        assert!(board.snapshot().last_error.unwrap().contains("locked"));
    }
}
