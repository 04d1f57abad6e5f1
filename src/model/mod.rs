//! Core data models for the catalog.
//!
//! - [`ObservedFile`]: what the file observer saw this scan (never stored)
//! - [`LibraryTrack`]: a persisted catalog entry
//! - [`NewTrack`] / [`TrackUpdate`]: normalized rows on their way into the
//!   catalog
//! - [`EnrichmentStatus`]: the enrichment state machine
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `artists`, `albums`, `genres` - deduplicated names
//! - `tracks` - one row per distinct `external_uri`
//! - `track_lyrics` - lyrics text, removed with its track

use std::path::PathBuf;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// A file as reported by a [`FileObserver`](crate::scanner::FileObserver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    /// Stable identifier (the file path for the filesystem observer)
    pub external_uri: String,
    /// Title tag, or the file stem when untagged
    pub raw_title: String,
    pub raw_artist: Option<String>,
    pub raw_album: Option<String>,
    pub raw_genre: Option<String>,
    pub duration_ms: u64,
    pub track_number: Option<u32>,
    pub year: Option<i32>,
    /// Modification time in milliseconds since the epoch
    pub last_modified: i64,
    /// Present on disk but its tags could not be read. Only `external_uri`
    /// and `last_modified` are meaningful.
    pub unreadable: bool,
}

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryTrack {
    pub id: i64,
    pub external_uri: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub version_tag: Option<String>,
    pub duration_secs: i64,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub last_modified: i64,
    /// Raw inputs the normalized fields were derived from
    pub raw_title: String,
    pub raw_artist: Option<String>,
    pub raw_album: Option<String>,
    /// Insertion time in milliseconds; oldest tracks are enriched first
    pub added_at: i64,
    pub enrichment_status: EnrichmentStatus,
    pub enrichment_attempts: u32,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub lyrics_available: bool,
    pub cover_path: Option<PathBuf>,
    pub last_error: Option<String>,
}

/// A normalized track ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub external_uri: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub version_tag: Option<String>,
    pub duration_secs: i64,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub last_modified: i64,
    pub raw_title: String,
    pub raw_artist: Option<String>,
    pub raw_album: Option<String>,
}

/// A metadata rewrite for an existing track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackUpdate {
    pub id: i64,
    pub track: NewTrack,
    /// Title/artist were re-derived from changed raw inputs
    pub renormalized: bool,
    /// Artist or title changed; prior enrichment no longer applies
    pub reset_enrichment: bool,
}

bitflags! {
    /// Detail fields a matched track still lacks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MissingFields: u8 {
        const COVER = 0b01;
        const LYRICS = 0b10;
    }
}

/// Enrichment state of a track.
///
/// ```text
/// Pending ──claim──▶ Resolving ──▶ Enriched
///    ▲                   │   └───▶ Partial { missing }
///    │ reset             └───────▶ Failed ──(attempts ≥ max)──▶ Exhausted
///    └─────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    Resolving,
    Enriched,
    Partial { missing: MissingFields },
    Failed,
    Exhausted,
}

impl EnrichmentStatus {
    /// Name as stored in the `enrichment_status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Enriched => "enriched",
            Self::Partial { .. } => "partial",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        }
    }

    /// Value for the `missing_fields` column.
    pub fn missing_mask(&self) -> i64 {
        match self {
            Self::Partial { missing } => i64::from(missing.bits()),
            _ => 0,
        }
    }

    /// Rebuild from the two stored columns.
    pub fn from_columns(status: &str, missing_mask: i64) -> Result<Self> {
        Ok(match status {
            "pending" => Self::Pending,
            "resolving" => Self::Resolving,
            "enriched" => Self::Enriched,
            "partial" => {
                let bits = u8::try_from(missing_mask).map_err(|_| {
                    Error::data_integrity(format!("missing_fields out of range: {missing_mask}"))
                })?;
                Self::Partial {
                    missing: MissingFields::from_bits_truncate(bits),
                }
            }
            "failed" => Self::Failed,
            "exhausted" => Self::Exhausted,
            other => {
                return Err(Error::data_integrity(format!(
                    "unknown enrichment status {other:?}"
                )));
            }
        })
    }
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Partial { missing } => {
                let mut names = Vec::new();
                if missing.contains(MissingFields::COVER) {
                    names.push("cover");
                }
                if missing.contains(MissingFields::LYRICS) {
                    names.push("lyrics");
                }
                write!(f, "partial (missing {})", names.join(", "))
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// Ownership of one enrichment attempt. Writes carrying a stale token are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub track_id: i64,
    pub token: String,
    /// Attempt number this claim represents (1-based)
    pub attempt: u32,
}

/// Final state of one enrichment attempt, ready to persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentOutcome {
    pub status: EnrichmentStatus,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub lyrics: Option<String>,
    pub cover_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Which tracks a manual reset applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    Ids(Vec<i64>),
    AllExhausted,
}

/// Track counts per enrichment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub pending: u64,
    pub resolving: u64,
    pub enriched: u64,
    pub partial: u64,
    pub failed: u64,
    pub exhausted: u64,
}

impl EnrichmentSummary {
    pub fn total(&self) -> u64 {
        self.pending + self.resolving + self.enriched + self.partial + self.failed + self.exhausted
    }
}

/// Rows removed by orphan collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanCounts {
    pub artists: u64,
    pub albums: u64,
    pub genres: u64,
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_column_roundtrip() {
        let statuses = [
            EnrichmentStatus::Pending,
            EnrichmentStatus::Resolving,
            EnrichmentStatus::Enriched,
            EnrichmentStatus::Partial {
                missing: MissingFields::COVER | MissingFields::LYRICS,
            },
            EnrichmentStatus::Partial {
                missing: MissingFields::LYRICS,
            },
            EnrichmentStatus::Failed,
            EnrichmentStatus::Exhausted,
        ];
        for status in statuses {
            let parsed =
                EnrichmentStatus::from_columns(status.as_str(), status.missing_mask()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_integrity_error() {
        let err = EnrichmentStatus::from_columns("done", 0).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
        assert!(EnrichmentStatus::from_columns("partial", 9999).is_err());
    }

    #[test]
    fn test_status_display() {
        let status = EnrichmentStatus::Partial {
            missing: MissingFields::COVER,
        };
        assert_eq!(status.to_string(), "partial (missing cover)");
        assert_eq!(EnrichmentStatus::Exhausted.to_string(), "exhausted");
    }

    #[test]
    fn test_summary_total() {
        let summary = EnrichmentSummary {
            pending: 2,
            enriched: 3,
            exhausted: 1,
            ..Default::default()
        };
        assert_eq!(summary.total(), 6);
    }
}
