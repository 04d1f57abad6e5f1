//! Genius HTTP client
//!
//! Handles communication with the Genius API and song pages.
//! See: https://docs.genius.com
//!
//! IMPORTANT: the API requires a bearer token. Song pages do not, but they
//! rate limit aggressively; callers go through the resolver's throttle.

use super::{adapter, dto};
use crate::enrichment::domain::{EnrichmentError, MatchCandidate, TrackDetails};

/// Genius API client
pub struct GeniusClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

/// User agent string sent with every request
const USER_AGENT: &str = concat!("CatalogMinder/", env!("CARGO_PKG_VERSION"));

impl GeniusClient {
    /// Create a new client
    pub fn new(access_token: impl Into<String>) -> Result<Self, EnrichmentError> {
        Self::with_base_url(access_token, "https://api.genius.com")
    }

    /// Create a client against a custom API root
    pub fn with_base_url(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            access_token: access_token.into(),
        })
    }

    /// Search songs. Candidates keep the API's relevance order.
    pub async fn search(&self, query: &str) -> Result<Vec<MatchCandidate>, EnrichmentError> {
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let detail = match response.json::<dto::ApiError>().await {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => status.to_string(),
            };
            return Err(EnrichmentError::Unauthorized(detail));
        }
        check_status(status)?;

        let envelope = response
            .json::<dto::SearchEnvelope>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

        match envelope.response {
            Some(body) => Ok(adapter::to_candidates(body)),
            None => Err(EnrichmentError::InvalidResponse(
                envelope
                    .meta
                    .message
                    .unwrap_or_else(|| format!("status {} without response", envelope.meta.status)),
            )),
        }
    }

    /// Fetch a song page and extract lyrics and cover art from it.
    pub async fn fetch_details(&self, page_url: &str) -> Result<TrackDetails, EnrichmentError> {
        let response = self
            .http_client
            .get(page_url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        check_status(response.status())?;

        let html = response
            .text()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(TrackDetails {
            lyrics: adapter::extract_lyrics(&html),
            cover_art_url: adapter::extract_cover_art(&html),
        })
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), EnrichmentError> {
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(EnrichmentError::NoMatches);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(EnrichmentError::RateLimited);
    }

    if status.is_server_error() {
        return Err(EnrichmentError::Network(format!(
            "HTTP {}: {}",
            status,
            status.canonical_reason().unwrap_or("Unknown")
        )));
    }

    if !status.is_success() {
        return Err(EnrichmentError::ApiError(format!("HTTP {status}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeniusClient::new("token").unwrap();
        assert_eq!(client.base_url, "https://api.genius.com");
        assert_eq!(client.access_token, "token");
    }

    #[test]
    fn test_client_with_custom_url() {
        let client = GeniusClient::with_base_url("token", "http://localhost:8080").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_user_agent_format() {
        assert!(USER_AGENT.starts_with("CatalogMinder/"));
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;
        assert!(check_status(StatusCode::OK).is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND),
            Err(EnrichmentError::NoMatches)
        ));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(EnrichmentError::RateLimited)
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY),
            Err(EnrichmentError::Network(_))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_REQUEST),
            Err(EnrichmentError::ApiError(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = GeniusClient::with_base_url("token", "http://127.0.0.1:1").unwrap();
        let result = client.search("anything").await;
        assert!(matches!(result, Err(EnrichmentError::Network(_))));
    }
}
