//! Cover art disk cache.
//!
//! Files are named by the SHA-256 of the source URL, with an extension
//! taken from the response content type. Writes go to a temporary file
//! first and are renamed into place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::enrichment::{AssetStore, EnrichmentError};

/// Extensions a cached cover may have.
const EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

/// User agent string sent with every download
const USER_AGENT: &str = concat!("CatalogMinder/", env!("CARGO_PKG_VERSION"));

/// Cover art disk cache.
pub struct CoverCache {
    cache_dir: PathBuf,
    http_client: reqwest::Client,
}

impl CoverCache {
    /// Create a new cache in the specified directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, EnrichmentError> {
        Self::with_timeout(cache_dir, Duration::from_secs(15))
    }

    /// Create a cache whose downloads give up after `timeout`.
    pub fn with_timeout(
        cache_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;
        Ok(Self {
            cache_dir: cache_dir.into(),
            http_client,
        })
    }

    /// Create a cache in the default location (user cache directory).
    pub fn default_location() -> Result<Self, EnrichmentError> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("catalog-minder")
            .join("covers");
        Self::new(cache_dir)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The cached file for `url`, if one exists.
    pub fn get(&self, url: &str) -> Option<PathBuf> {
        let key = cache_key(url);
        EXTENSIONS
            .iter()
            .map(|ext| self.cache_dir.join(format!("{key}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Check if a URL is cached.
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Store image bytes for `url`.
    pub async fn put(&self, url: &str, data: &[u8], mime_type: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let key = cache_key(url);
        let path = self.cache_dir.join(format!("{key}.{}", extension_for(mime_type)));
        let tmp = self.cache_dir.join(format!("{key}.part"));
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Clear all cached covers.
    pub fn clear(&self) -> std::io::Result<()> {
        if self.cache_dir.exists() {
            for entry in std::fs::read_dir(&self.cache_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    std::fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }

    /// Get the total size of the cache in bytes.
    pub fn size_bytes(&self) -> u64 {
        std::fs::read_dir(&self.cache_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Download an image. Non-image responses are rejected.
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), EnrichmentError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NoMatches);
        }
        if !status.is_success() {
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        if !mime_type.starts_with("image/") {
            return Err(EnrichmentError::InvalidResponse(format!(
                "expected an image, got {mime_type}"
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?
            .to_vec();
        if data.is_empty() {
            return Err(EnrichmentError::InvalidResponse("empty image".to_string()));
        }

        Ok((data, mime_type))
    }
}

#[async_trait]
impl AssetStore for CoverCache {
    async fn download_and_cache(&self, url: &str) -> Option<PathBuf> {
        if let Some(path) = self.get(url) {
            return Some(path);
        }

        let (data, mime_type) = match self.fetch(url).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(target: "enrichment", url, error = %e, "Cover download failed");
                return None;
            }
        };

        match self.put(url, &data, &mime_type).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(target: "enrichment", url, error = %e, "Cover cache write failed");
                None
            }
        }
    }
}

fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

fn extension_for(mime_type: &str) -> &'static str {
    if mime_type.contains("png") {
        "png"
    } else if mime_type.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}
