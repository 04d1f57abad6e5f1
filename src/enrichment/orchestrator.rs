//! Batch enrichment of pending catalog tracks.
//!
//! One batch:
//!
//! 1. freezes failed tracks that reached the attempt cap (`Exhausted`)
//! 2. selects up to `limit` eligible tracks, oldest first
//! 3. for each track: claim, resolve, fetch details, cache the cover,
//!    classify, record
//! 4. sleeps an adaptive delay between tracks
//!
//! Per-track failures are state transitions, never errors. Only catalog
//! failures and rejected credentials abort a batch, as a [`BatchError`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::domain::{EnrichmentError, MatchCandidate, TriggerReason};
use super::pacing::{PacingPolicy, RetryPolicy};
use super::resolver::{EntityResolver, Resolution};
use super::traits::AssetStore;
use crate::catalog::Catalog;
use crate::config::EnrichmentConfig;
use crate::error::{Error, ErrorKind};
use crate::model::{Claim, EnrichmentOutcome, EnrichmentStatus, LibraryTrack, MissingFields};
use crate::status::StatusBoard;

/// Emitted after each track of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentProgress {
    /// 1-based position in the batch
    pub current: usize,
    pub total: usize,
    /// `"Artist - Title"`
    pub label: String,
}

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub enriched: u32,
    pub partial: u32,
    pub failed: u32,
    /// Lost claims and stale writes
    pub skipped: u32,
    pub total_time_ms: u64,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn processed(&self) -> u32 {
        self.enriched + self.partial + self.failed + self.skipped
    }
}

/// Why a batch stopped early.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Worth running again later
    #[error("Batch aborted, retryable: {0}")]
    Retryable(#[source] Error),

    /// Needs user action (credentials, permissions, corrupt data)
    #[error("Batch aborted: {0}")]
    Permanent(#[source] Error),
}

impl BatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn into_inner(self) -> Error {
        match self {
            Self::Retryable(e) | Self::Permanent(e) => e,
        }
    }
}

impl From<Error> for BatchError {
    fn from(error: Error) -> Self {
        if error.is_transient() {
            Self::Retryable(error)
        } else {
            Self::Permanent(error)
        }
    }
}

/// How a single track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackResult {
    Enriched,
    Partial,
    Failed,
    Skipped,
}

/// Drives enrichment batches against a [`Catalog`].
pub struct EnrichmentOrchestrator {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<EntityResolver>,
    assets: Arc<dyn AssetStore>,
    config: EnrichmentConfig,
    pacing: PacingPolicy,
    progress: Option<mpsc::Sender<EnrichmentProgress>>,
    status: Arc<StatusBoard>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        resolver: Arc<EntityResolver>,
        assets: Arc<dyn AssetStore>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            catalog,
            resolver,
            assets,
            pacing: PacingPolicy::from_config(&config),
            config,
            progress: None,
            status: Arc::new(StatusBoard::new()),
        }
    }

    /// Send [`EnrichmentProgress`] after every track.
    pub fn with_progress(mut self, sender: mpsc::Sender<EnrichmentProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_status(mut self, status: Arc<StatusBoard>) -> Self {
        self.status = status;
        self
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Run a batch sized for `reason`, with the configured retries.
    pub async fn run_triggered(
        &self,
        reason: TriggerReason,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let limit = self.config.batch_size_for(reason);
        tracing::info!(target: "enrichment", reason = %reason, limit, "Enrichment triggered");
        self.run_with_retries(
            limit,
            self.config.max_attempts,
            RetryPolicy::from_config(&self.config),
            cancel,
        )
        .await
    }

    /// [`run_batch`](Self::run_batch), re-run after retryable aborts with
    /// exponential backoff. The last error escalates once retries run out.
    pub async fn run_with_retries(
        &self,
        limit: u32,
        max_attempts: u32,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let mut retry = 0;
        loop {
            match self.run_batch(limit, max_attempts, cancel).await {
                Err(BatchError::Retryable(e)) if retry < policy.max_retries => {
                    let delay = policy.delay(retry);
                    retry += 1;
                    tracing::warn!(
                        target: "enrichment",
                        error = %e,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Batch failed, retrying"
                    );
                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(BatchError::Retryable(e));
                    }
                }
                other => return other,
            }
        }
    }

    /// Enrich up to `limit` eligible tracks.
    ///
    /// Cancellation is honoured between tracks and during the pacing
    /// delay; the track in flight is finished and recorded first.
    pub async fn run_batch(
        &self,
        limit: u32,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        self.status.set_enriching(true);
        let result = self.run_batch_inner(limit, max_attempts, cancel).await;
        self.status.set_enriching(false);

        match &result {
            Ok(batch) => self.status.record_batch(batch),
            Err(e) => self.status.record_error(e.to_string()),
        }
        result
    }

    async fn run_batch_inner(
        &self,
        limit: u32,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let started = Instant::now();
        let mut result = BatchResult::default();

        let frozen = self.catalog.mark_exhausted(max_attempts).await?;
        if frozen > 0 {
            tracing::info!(target: "enrichment", count = frozen, "Tracks exhausted");
        }

        let tracks = self.catalog.find_pending_enrichment(max_attempts, limit).await?;
        let total = tracks.len();
        tracing::info!(target: "enrichment", total, "Starting enrichment batch");

        let (mut successes, mut failures) = (0u32, 0u32);
        for (index, track) in tracks.iter().enumerate() {
            if index > 0 {
                let delay = self.pacing.delay(failures, successes);
                if !sleep_or_cancel(delay, cancel).await {
                    result.cancelled = true;
                    break;
                }
            } else if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            let outcome = match self.enrich_track(track, max_attempts).await {
                Ok(outcome) => outcome,
                Err(e) if e.kind() == ErrorKind::DataIntegrity => {
                    tracing::warn!(target: "enrichment", track_id = track.id, error = %e, "Skipping track");
                    TrackResult::Skipped
                }
                Err(e) => return Err(e.into()),
            };

            match outcome {
                TrackResult::Enriched => {
                    result.enriched += 1;
                    successes += 1;
                }
                TrackResult::Partial => {
                    result.partial += 1;
                    successes += 1;
                }
                TrackResult::Failed => {
                    result.failed += 1;
                    failures += 1;
                }
                TrackResult::Skipped => result.skipped += 1,
            }

            self.report_progress(index + 1, total, track).await;
        }

        result.total_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            target: "enrichment",
            enriched = result.enriched,
            partial = result.partial,
            failed = result.failed,
            skipped = result.skipped,
            cancelled = result.cancelled,
            elapsed_ms = result.total_time_ms,
            "Enrichment batch complete"
        );
        Ok(result)
    }

    /// Claim, resolve and record one track.
    async fn enrich_track(
        &self,
        track: &LibraryTrack,
        max_attempts: u32,
    ) -> crate::error::Result<TrackResult> {
        let Some(claim) = self.catalog.claim_for_enrichment(track.id, max_attempts).await? else {
            tracing::debug!(target: "enrichment", track_id = track.id, "Claim lost, skipping");
            return Ok(TrackResult::Skipped);
        };

        let resolution = self
            .resolver
            .resolve_detailed(&track.title, Some(track.artist.as_str()))
            .await;

        let (outcome, abort) = match resolution {
            Resolution::Matched(candidate) => match self.collect_details(&candidate).await {
                Ok(outcome) => (outcome, None),
                Err(e) => (failure(&claim, max_attempts, e.to_string()), Some(e)),
            },
            Resolution::NoMatch => (failure(&claim, max_attempts, "no match".to_string()), None),
            Resolution::Unavailable(e) => {
                let message = e.to_string();
                let abort = e.is_unauthorized().then_some(e);
                (failure(&claim, max_attempts, message), abort)
            }
        };

        let result = match outcome.status {
            EnrichmentStatus::Enriched => TrackResult::Enriched,
            EnrichmentStatus::Partial { .. } => TrackResult::Partial,
            _ => TrackResult::Failed,
        };

        let recorded = self.catalog.record_enrichment(&claim, &outcome).await?;
        if let Some(e) = abort {
            return Err(Error::from(e).context(format!("enriching track {}", track.id)));
        }
        if !recorded {
            return Ok(TrackResult::Skipped);
        }

        tracing::debug!(
            target: "enrichment",
            track_id = track.id,
            attempt = claim.attempt,
            status = %outcome.status,
            "Track recorded"
        );
        Ok(result)
    }

    /// Lyrics and cover for a matched candidate.
    ///
    /// Detail or download failures leave fields missing; only rejected
    /// credentials are returned as an error.
    async fn collect_details(
        &self,
        candidate: &MatchCandidate,
    ) -> Result<EnrichmentOutcome, EnrichmentError> {
        let details = match self.resolver.fetch_details(&candidate.url).await {
            Ok(details) => details,
            Err(e) if e.is_unauthorized() => return Err(e),
            Err(e) => {
                tracing::warn!(target: "enrichment", url = %candidate.url, error = %e, "Detail fetch failed");
                Default::default()
            }
        };

        let lyrics = details.lyrics.filter(|l| !l.trim().is_empty());
        let cover_path = match details.cover_art_url.or_else(|| candidate.cover_art_url.clone()) {
            Some(url) => self.assets.download_and_cache(&url).await,
            None => None,
        };

        let mut missing = MissingFields::empty();
        if cover_path.is_none() {
            missing |= MissingFields::COVER;
        }
        if lyrics.is_none() {
            missing |= MissingFields::LYRICS;
        }

        Ok(EnrichmentOutcome {
            status: if missing.is_empty() {
                EnrichmentStatus::Enriched
            } else {
                EnrichmentStatus::Partial { missing }
            },
            external_id: Some(candidate.external_id.clone()),
            external_url: Some(candidate.url.clone()),
            lyrics,
            cover_path,
            error: None,
        })
    }

    async fn report_progress(&self, current: usize, total: usize, track: &LibraryTrack) {
        let Some(sender) = &self.progress else {
            return;
        };
        let progress = EnrichmentProgress {
            current,
            total,
            label: format!("{} - {}", track.artist, track.title),
        };
        // A dropped receiver only means nobody is watching
        let _ = sender.send(progress).await;
    }
}

/// A failed attempt; the last allowed one freezes the track.
fn failure(claim: &Claim, max_attempts: u32, error: String) -> EnrichmentOutcome {
    EnrichmentOutcome {
        status: if claim.attempt >= max_attempts {
            EnrichmentStatus::Exhausted
        } else {
            EnrichmentStatus::Failed
        },
        error: Some(error),
        ..Default::default()
    }
}

/// Sleep for `delay`. Returns `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Adapt a progress receiver into a [`Stream`].
pub fn progress_stream(
    receiver: mpsc::Receiver<EnrichmentProgress>,
) -> impl Stream<Item = EnrichmentProgress> {
    futures::stream::unfold(receiver, |mut rx| async move {
        rx.recv().await.map(|progress| (progress, rx))
    })
}
