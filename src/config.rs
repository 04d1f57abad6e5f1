//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\catalog-minder\config.toml
//! - macOS: ~/Library/Application Support/catalog-minder/config.toml
//! - Linux: ~/.config/catalog-minder/config.toml
//!
//! Every section uses `#[serde(default)]`, so a partial file only overrides
//! the keys it names. Similarity thresholds, decoration patterns and the
//! denylist live here rather than in code: they are tuning knobs, not
//! invariants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::enrichment::TriggerReason;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Library scan settings
    pub library: LibraryConfig,

    /// Title/artist parsing rules
    pub normalizer: NormalizerConfig,

    /// External search and candidate filtering
    pub resolver: ResolverConfig,

    /// Enrichment batch policy
    pub enrichment: EnrichmentConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Genius API access token for song search
    pub genius_access_token: Option<String>,
}

/// Library scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories to enumerate for audio files
    pub paths: Vec<PathBuf>,

    /// Catalog database file (None = default location)
    pub database: Option<PathBuf>,

    /// Files shorter than this are ignored by the observer
    pub min_duration_ms: u64,

    /// New tracks committed per transaction
    pub insert_batch_size: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            database: None,
            min_duration_ms: 30_000,
            insert_batch_size: 50,
        }
    }
}

/// Title/artist parsing rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Regex patterns for non-musical decorations, removed in order
    pub decoration_patterns: Vec<String>,

    /// Keywords that mark a trailing version/edition tag
    pub version_keywords: Vec<String>,

    /// Hint similarity at which a separator side is taken as the artist
    pub artist_confidence: f32,

    /// Artist sentinel when none can be determined
    pub unknown_artist: String,

    /// Title sentinel for empty input
    pub unknown_title: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            decoration_patterns: [
                // File extensions left over from file names
                r"(?i)\.(?:mp3|flac|m4a|aac|ogg|opus|wav|wma)\s*$",
                // "(Official Video)", "[Lyric Video]", "(Official Audio)", "(Visualizer)"
                r"(?i)[\(\[\{]\s*(?:official\s+)?(?:music\s+|lyrics?\s+|hd\s+)?(?:video|audio|visuali[sz]er|clip)(?:\s+\d{4})?\s*[\)\]\}]",
                // Quality markers: "[HD]", "(HQ)", "[4K]", "(1080p)"
                r"(?i)[\(\[\{]\s*(?:hd|hq|4k|1080p|720p|480p|high\s+quality)\s*[\)\]\}]",
                // "(Lyrics)", "[Explicit]", "(Clean)"
                r"(?i)[\(\[\{]\s*(?:with\s+)?(?:lyrics?|explicit|clean)\s*[\)\]\}]",
                // "(Free Download)", "[No Copyright]"
                r"(?i)[\(\[\{]\s*(?:free\s+download|download|no\s+copyright|copyright\s+free)\s*[\)\]\}]",
                // Site tag prefixes: "[www.site.com] ", "site.net - "
                r"(?i)^\s*[\(\[]?\s*(?:www\.)?[a-z0-9-]+\.(?:com|net|org|ru|info|me|io|fm|to)\s*[\)\]]?\s*(?:-\s+)?",
                // Site tag suffixes: " - site.com", " (www.site.net)"
                r"(?i)\s*(?:-\s+)?[\(\[]?\s*(?:www\.)?[a-z0-9-]+\.(?:com|net|org|ru|info|me|io|fm|to)\s*[\)\]]?\s*$",
                // Leading track numbers: "01. ", "3) ", "07_ ", "12 - "
                r"^\s*\d{1,3}\s*[.)_]\s+",
                r"^\s*\d{1,3}\s+-\s+",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            version_keywords: [
                "live",
                "remix",
                "remixed",
                "acoustic",
                "unplugged",
                "remaster",
                "remastered",
                "demo",
                "instrumental",
                "radio edit",
                "extended mix",
                "club mix",
                "edit",
                "reprise",
                "cover",
                "karaoke",
                "session",
                "version",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            artist_confidence: 0.6,
            unknown_artist: "Unknown Artist".to_string(),
            unknown_title: "Unknown Title".to_string(),
        }
    }
}

/// External search and candidate filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum spacing between external requests (global)
    pub min_request_interval_ms: u64,

    /// Upper bound on any single external call
    pub request_timeout_ms: u64,

    /// Minimum title similarity for a candidate to survive
    pub title_threshold: f32,

    /// Minimum artist similarity, applied when both sides know an artist
    pub artist_threshold: f32,

    /// Candidate titles containing any of these words/phrases are rejected
    pub denylist: Vec<String>,
}

impl ResolverConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 2_500,
            request_timeout_ms: 15_000,
            title_threshold: 0.4,
            artist_threshold: 0.3,
            denylist: [
                "discography",
                "interview",
                "remix",
                "tracklist",
                "translation",
                "translations",
                "annotated",
                "setlist",
                "liner notes",
                "skit",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Enrichment batch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Attempts before a track is frozen as exhausted
    pub max_attempts: u32,

    /// Batch size for a user-requested run
    pub manual_batch_size: u32,

    /// Batch size for the run that follows a scan
    pub post_scan_batch_size: u32,

    /// Batch size for periodic background runs
    pub periodic_batch_size: u32,

    /// Inter-track delay when the batch is healthy
    pub base_delay_ms: u64,

    /// Cap for the adaptive inter-track delay
    pub max_delay_ms: u64,

    /// A Resolving claim older than this is considered abandoned
    pub stale_claim_secs: u64,

    /// Whole-batch retries after a transient failure
    pub batch_retries: u32,

    /// First whole-batch retry delay (doubles per retry)
    pub retry_base_delay_ms: u64,

    /// Cap for the whole-batch retry delay
    pub retry_max_delay_ms: u64,
}

impl EnrichmentConfig {
    /// Batch size for a given trigger.
    pub fn batch_size_for(&self, reason: TriggerReason) -> u32 {
        match reason {
            TriggerReason::Manual => self.manual_batch_size,
            TriggerReason::PostScan => self.post_scan_batch_size,
            TriggerReason::Periodic => self.periodic_batch_size,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            manual_batch_size: 50,
            post_scan_batch_size: 20,
            periodic_batch_size: 10,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            stale_claim_secs: 600,
            batch_retries: 3,
            retry_base_delay_ms: 5_000,
            retry_max_delay_ms: 300_000,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalog-minder"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Default catalog database location (user data directory).
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("catalog-minder")
        .join("catalog.db")
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to an explicit path.
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[normalizer]"));
        assert!(toml.contains("[resolver]"));
        assert!(toml.contains("[enrichment]"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[resolver]
min_request_interval_ms = 1000

[enrichment]
max_attempts = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.resolver.min_request_interval(), Duration::from_secs(1));
        assert_eq!(config.enrichment.max_attempts, 5);

        // Other fields use defaults
        assert_eq!(config.resolver.title_threshold, 0.4);
        assert_eq!(config.resolver.artist_threshold, 0.3);
        assert_eq!(config.library.insert_batch_size, 50);
        assert_eq!(config.normalizer.unknown_artist, "Unknown Artist");
        assert!(config.credentials.genius_access_token.is_none());
    }

    #[test]
    fn test_batch_size_per_trigger() {
        let config = EnrichmentConfig::default();
        assert_eq!(config.batch_size_for(TriggerReason::Manual), 50);
        assert_eq!(config.batch_size_for(TriggerReason::PostScan), 20);
        assert_eq!(config.batch_size_for(TriggerReason::Periodic), 10);
    }

    #[test]
    fn test_save_to_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.credentials.genius_access_token = Some("token-123".to_string());
        save_to(&config, &path).unwrap();

        let parsed: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            parsed.credentials.genius_access_token.as_deref(),
            Some("token-123")
        );
        assert!(!path.with_extension("toml.tmp").exists());
    }
}
