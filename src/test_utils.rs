//! Test utilities and fixtures for catalog-minder tests.
//!
//! This module provides common test helpers, fixture factories, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_catalog, observed_file};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (catalog, _dir) = temp_catalog().await;
//!     let file = observed_file("/music/a.mp3", "Artist - Song", 100);
//!     // ... test logic
//! }
//! ```

use tempfile::TempDir;

use crate::catalog::{SqliteCatalog, db_url};
use crate::model::{EnrichmentStatus, LibraryTrack, NewTrack, ObservedFile};

/// Creates a temporary catalog for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_catalog() -> (SqliteCatalog, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");

    let catalog = SqliteCatalog::open(&db_url(Some(&db_path)))
        .await
        .expect("Failed to initialize test catalog");

    (catalog, dir)
}

/// An observed file with a three-minute duration and no tags but the title.
pub fn observed_file(uri: &str, raw_title: &str, last_modified: i64) -> ObservedFile {
    ObservedFile {
        external_uri: uri.to_string(),
        raw_title: raw_title.to_string(),
        raw_artist: None,
        raw_album: None,
        raw_genre: None,
        duration_ms: 180_000,
        track_number: None,
        year: None,
        last_modified,
        unreadable: false,
    }
}

/// An already-normalized track ready for `insert_batch`.
pub fn new_track(uri: &str, title: &str, artist: &str) -> NewTrack {
    NewTrack {
        external_uri: uri.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: None,
        genre: None,
        version_tag: None,
        duration_secs: 180,
        year: None,
        track_number: None,
        last_modified: 100,
        raw_title: format!("{artist} - {title}"),
        raw_artist: None,
        raw_album: None,
    }
}

/// A persisted track as `all_tracks` would return it.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let track = LibraryTrack {
///     enrichment_status: EnrichmentStatus::Failed,
///     ..library_track(1, "/a.mp3", 100)
/// };
/// ```
pub fn library_track(id: i64, uri: &str, last_modified: i64) -> LibraryTrack {
    LibraryTrack {
        id,
        external_uri: uri.to_string(),
        title: "Test Track".to_string(),
        artist: "Test Artist".to_string(),
        album: None,
        genre: None,
        version_tag: None,
        duration_secs: 180,
        year: None,
        track_number: None,
        last_modified,
        raw_title: "Test Artist - Test Track".to_string(),
        raw_artist: None,
        raw_album: None,
        added_at: 0,
        enrichment_status: EnrichmentStatus::Pending,
        enrichment_attempts: 0,
        external_id: None,
        external_url: None,
        lyrics_available: false,
        cover_path: None,
        last_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[tokio::test]
    async fn test_temp_catalog_creates_valid_database() {
        let (catalog, _dir) = temp_catalog().await;
        let tracks = catalog.all_tracks().await.unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_fixtures() {
        let file = observed_file("/a.mp3", "A - B", 7);
        assert_eq!(file.last_modified, 7);
        assert_eq!(new_track("/a.mp3", "B", "A").raw_title, "A - B");
        assert_eq!(library_track(3, "/a.mp3", 7).id, 3);
    }
}
