//! Trait definitions for the external metadata source and the asset store.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses [`GeniusClient`](super::genius::GeniusClient) and
//! [`CoverCache`](crate::cover::CoverCache), while tests substitute the
//! mocks below.

use std::path::PathBuf;

use async_trait::async_trait;

use super::domain::{EnrichmentError, MatchCandidate, TrackDetails};

/// Search and detail lookups against the external metadata source.
#[async_trait]
pub trait ExternalSearch: Send + Sync {
    /// Free-text search. Candidates come back in the source's ranking.
    async fn search(&self, query: &str) -> Result<Vec<MatchCandidate>, EnrichmentError>;

    /// Fetch lyrics and cover art for a candidate's page URL.
    async fn fetch_details(&self, url: &str) -> Result<TrackDetails, EnrichmentError>;
}

/// Downloads remote assets to local storage.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Download `url` (or reuse a cached copy). Failures yield `None`.
    async fn download_and_cache(&self, url: &str) -> Option<PathBuf>;
}

#[async_trait]
impl ExternalSearch for super::genius::GeniusClient {
    async fn search(&self, query: &str) -> Result<Vec<MatchCandidate>, EnrichmentError> {
        self.search(query).await
    }

    async fn fetch_details(&self, url: &str) -> Result<TrackDetails, EnrichmentError> {
        self.fetch_details(url).await
    }
}
