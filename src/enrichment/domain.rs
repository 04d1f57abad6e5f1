//! Internal domain models for external resolution and enrichment.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.

/// A search hit from the external source. Transient, never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// Source-specific identifier
    pub external_id: String,
    /// Song title as the source spells it
    pub title: String,
    /// Primary artist as the source spells it
    pub artist_name: Option<String>,
    /// Page URL for detail fetches
    pub url: String,
    /// Cover art URL when the search result already carries one
    pub cover_art_url: Option<String>,
}

/// Detail data fetched for a matched candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackDetails {
    /// Plain-text lyrics, lines separated by `\n`
    pub lyrics: Option<String>,
    /// Full-size cover art URL
    pub cover_art_url: Option<String>,
}

/// Why an enrichment batch was started. Selects the batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TriggerReason {
    /// User asked for it
    Manual,
    /// Right after a library scan
    PostScan,
    /// Background schedule
    Periodic,
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Manual => "manual",
            Self::PostScan => "post-scan",
            Self::Periodic => "periodic",
        })
    }
}

/// Errors that can occur while talking to the external source
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No matches found")]
    NoMatches,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl EnrichmentError {
    /// Credentials were rejected; retrying cannot succeed.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// The next attempt may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::RateLimited)
    }
}
