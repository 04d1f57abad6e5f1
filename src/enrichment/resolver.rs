//! Entity resolution: find the external record for a normalized track.
//!
//! Every outbound call goes through the shared [`Throttle`] and is bounded
//! by the request timeout. Candidates are filtered in order:
//!
//! 1. titles hitting the denylist ("Interview", "Tracklist", ...) are dropped
//! 2. title similarity must reach `title_threshold`
//! 3. when both sides know the artist, artist similarity must reach
//!    `artist_threshold`
//!
//! The first survivor wins; the source's ranking is trusted. Transport
//! failures never escape: [`EntityResolver::resolve`] turns them into
//! `None`, [`EntityResolver::resolve_detailed`] into
//! [`Resolution::Unavailable`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use super::domain::{EnrichmentError, MatchCandidate, TrackDetails};
use super::throttle::Throttle;
use super::traits::ExternalSearch;
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::similarity::match_score;

/// Outcome of a resolution attempt.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A candidate passed every filter
    Matched(MatchCandidate),
    /// The source answered, nothing acceptable came back
    NoMatch,
    /// The source could not be asked (network, timeout, auth)
    Unavailable(EnrichmentError),
}

/// Throttled, filtered lookups against an [`ExternalSearch`].
pub struct EntityResolver {
    search: Arc<dyn ExternalSearch>,
    throttle: Arc<Throttle>,
    request_timeout: Duration,
    title_threshold: f32,
    artist_threshold: f32,
    denylist: Vec<Regex>,
    unknown_artist: String,
}

impl EntityResolver {
    /// Create a resolver with its own throttle.
    pub fn new(
        search: Arc<dyn ExternalSearch>,
        config: &ResolverConfig,
        unknown_artist: impl Into<String>,
    ) -> Result<Self> {
        let throttle = Arc::new(Throttle::new(config.min_request_interval()));
        Self::with_throttle(search, throttle, config, unknown_artist)
    }

    /// Create a resolver sharing an existing throttle.
    pub fn with_throttle(
        search: Arc<dyn ExternalSearch>,
        throttle: Arc<Throttle>,
        config: &ResolverConfig,
        unknown_artist: impl Into<String>,
    ) -> Result<Self> {
        let denylist = config
            .denylist
            .iter()
            .map(|phrase| phrase.trim())
            .filter(|phrase| !phrase.is_empty())
            .map(|phrase| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase).replace(' ', r"\s+"));
                Regex::new(&pattern)
                    .map_err(|e| Error::config(format!("invalid denylist entry {phrase:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            search,
            throttle,
            request_timeout: config.request_timeout(),
            title_threshold: config.title_threshold,
            artist_threshold: config.artist_threshold,
            denylist,
            unknown_artist: unknown_artist.into(),
        })
    }

    /// Best candidate for `title` (and `artist`, when known), if any.
    pub async fn resolve(&self, title: &str, artist: Option<&str>) -> Option<MatchCandidate> {
        match self.resolve_detailed(title, artist).await {
            Resolution::Matched(candidate) => Some(candidate),
            Resolution::NoMatch | Resolution::Unavailable(_) => None,
        }
    }

    /// Like [`resolve`](Self::resolve), but tells "nothing found" apart
    /// from "could not ask".
    pub async fn resolve_detailed(&self, title: &str, artist: Option<&str>) -> Resolution {
        let artist = artist.filter(|a| self.is_known_artist(a));
        let query = self.build_query(title, artist);

        let candidates = match self.call(self.search.search(&query)).await {
            Ok(candidates) => candidates,
            Err(EnrichmentError::NoMatches) => return Resolution::NoMatch,
            Err(e) => {
                tracing::warn!(target: "resolver", query = %query, error = %e, "Search unavailable");
                return Resolution::Unavailable(e);
            }
        };

        let total = candidates.len();
        match candidates
            .into_iter()
            .find(|candidate| self.accepts(candidate, title, artist))
        {
            Some(candidate) => {
                tracing::debug!(
                    target: "resolver",
                    query = %query,
                    external_id = %candidate.external_id,
                    "Resolved"
                );
                Resolution::Matched(candidate)
            }
            None => {
                tracing::debug!(target: "resolver", query = %query, candidates = total, "No acceptable match");
                Resolution::NoMatch
            }
        }
    }

    /// Fetch details for a matched candidate, throttled and time-bounded.
    pub async fn fetch_details(&self, url: &str) -> std::result::Result<TrackDetails, EnrichmentError> {
        self.call(self.search.fetch_details(url)).await
    }

    /// `"title artist"`, or just the title when the artist is unknown.
    pub fn build_query(&self, title: &str, artist: Option<&str>) -> String {
        match artist.filter(|a| self.is_known_artist(a)) {
            Some(artist) => format!("{} {}", title.trim(), artist.trim()),
            None => title.trim().to_string(),
        }
    }

    /// Whether `candidate` passes the denylist and similarity filters.
    pub fn accepts(&self, candidate: &MatchCandidate, title: &str, artist: Option<&str>) -> bool {
        if self.denylist.iter().any(|re| re.is_match(&candidate.title)) {
            return false;
        }

        if match_score(&candidate.title, title) < self.title_threshold {
            return false;
        }

        match (artist.filter(|a| self.is_known_artist(a)), &candidate.artist_name) {
            (Some(wanted), Some(found)) => match_score(found, wanted) >= self.artist_threshold,
            _ => true,
        }
    }

    fn is_known_artist(&self, artist: &str) -> bool {
        let artist = artist.trim();
        !artist.is_empty() && !artist.eq_ignore_ascii_case(&self.unknown_artist)
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = std::result::Result<T, EnrichmentError>>,
    ) -> std::result::Result<T, EnrichmentError> {
        self.throttle.acquire().await;
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(EnrichmentError::Timeout(self.request_timeout.as_millis() as u64)),
        }
    }
}
