//! Genius API Data Transfer Objects
//!
//! These types match EXACTLY what the Genius API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the genius module - convert to domain types.
//!
//! We only use the /search endpoint; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Envelope for every API response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchEnvelope {
    pub meta: Meta,
    pub response: Option<SearchResponse>,
}

/// Status block present on success and failure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Meta {
    pub status: u16,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// One search hit. `type` is "song" for everything /search returns today.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Hit {
    #[serde(rename = "type")]
    pub hit_type: String,
    pub result: Song,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Song {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub primary_artist: Option<Artist>,
    pub song_art_image_url: Option<String>,
    pub header_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artist {
    pub id: u64,
    pub name: String,
}

/// OAuth-style error body returned for bad or missing tokens
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{
        "meta": {"status": 200},
        "response": {
            "hits": [
                {
                    "highlights": [],
                    "index": "song",
                    "type": "song",
                    "result": {
                        "id": 1063,
                        "title": "Bohemian Rhapsody",
                        "url": "https://genius.com/Queen-bohemian-rhapsody-lyrics",
                        "song_art_image_url": "https://images.genius.com/cover.jpg",
                        "header_image_url": "https://images.genius.com/header.jpg",
                        "primary_artist": {"id": 563, "name": "Queen"}
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_search_response() {
        let envelope: SearchEnvelope = serde_json::from_str(SEARCH_JSON).unwrap();
        assert_eq!(envelope.meta.status, 200);
        let hits = envelope.response.unwrap().hits;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].result.title, "Bohemian Rhapsody");
        assert_eq!(hits[0].result.primary_artist.as_ref().unwrap().name, "Queen");
    }

    #[test]
    fn test_parse_error_envelope() {
        let json = r#"{"meta": {"status": 401, "message": "This call requires an access_token."}}"#;
        let envelope: SearchEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.meta.status, 401);
        assert!(envelope.response.is_none());
    }

    #[test]
    fn test_parse_oauth_error() {
        let json = r#"{"error": "invalid_token", "error_description": "The access token provided is expired"}"#;
        let err: ApiError = serde_json::from_str(json).unwrap();
        assert_eq!(err.error, "invalid_token");
    }
}
