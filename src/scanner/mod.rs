//! File enumeration.
//!
//! [`FileObserver`] is the seam the catalog sync reads the current file set
//! through. [`FsObserver`] walks directories with walkdir and reads tags
//! in parallel with rayon; it is synchronous and meant to be driven from
//! `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::metadata::{self, FileTags};
use crate::model::ObservedFile;

/// Extensions treated as audio (case-insensitive).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac", "aiff"];

/// Source of the current set of audio files.
pub trait FileObserver: Send + Sync {
    /// Every audio file currently present. Order is unspecified.
    fn list_audio_files(&self) -> Result<Vec<ObservedFile>>;
}

/// Whether `path` has an audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Recursive directory observer.
#[derive(Debug, Clone)]
pub struct FsObserver {
    roots: Vec<PathBuf>,
    min_duration_ms: u64,
}

impl FsObserver {
    /// Files shorter than `min_duration_ms` (ringtones, notification
    /// sounds) are left out.
    pub fn new(roots: Vec<PathBuf>, min_duration_ms: u64) -> Self {
        Self {
            roots,
            min_duration_ms,
        }
    }

    fn walk_root(root: &Path) -> Result<Vec<PathBuf>> {
        std::fs::metadata(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::not_found(root),
            std::io::ErrorKind::PermissionDenied => {
                Error::permission_denied(format!("cannot read {}", root.display()))
            }
            _ => Error::Io(e),
        })?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_audio_file(entry.path()) => {
                    paths.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => walk_error(e)?,
            }
        }
        Ok(paths)
    }

    fn observe(&self, path: &Path) -> Option<ObservedFile> {
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis() as i64);

        let tags = match metadata::read(path) {
            Ok(tags) => tags,
            Err(e) => {
                // Still reported, so the catalog keeps whatever it knew
                tracing::warn!(target: "scan", path = %path.display(), error = %e, "Tags unreadable");
                return Some(ObservedFile {
                    unreadable: true,
                    ..to_observed(path, FileTags::default(), last_modified)
                });
            }
        };

        if tags.duration_ms < self.min_duration_ms {
            tracing::trace!(target: "scan", path = %path.display(), duration_ms = tags.duration_ms, "Too short");
            return None;
        }

        Some(to_observed(path, tags, last_modified))
    }
}

/// A directory that cannot be listed fails the walk: its files would
/// otherwise look deleted. Entries that vanished mid-walk and symlink
/// loops are only logged.
fn walk_error(e: walkdir::Error) -> Result<()> {
    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
    match e.io_error().map(std::io::Error::kind) {
        Some(std::io::ErrorKind::PermissionDenied) => {
            Err(Error::permission_denied(format!("cannot read {path}")))
        }
        Some(std::io::ErrorKind::NotFound) | None => {
            tracing::warn!(target: "scan", path = %path, error = %e, "Skipping entry");
            Ok(())
        }
        Some(_) => Err(Error::Io(e.into())),
    }
}

impl FileObserver for FsObserver {
    fn list_audio_files(&self) -> Result<Vec<ObservedFile>> {
        let mut paths = Vec::new();
        for root in &self.roots {
            paths.extend(Self::walk_root(root)?);
        }

        let files: Vec<ObservedFile> = paths.par_iter().filter_map(|p| self.observe(p)).collect();

        tracing::debug!(
            target: "scan",
            candidates = paths.len(),
            observed = files.len(),
            "Enumeration complete"
        );
        Ok(files)
    }
}

/// Build an [`ObservedFile`]; untagged files are titled by their stem.
fn to_observed(path: &Path, tags: FileTags, last_modified: i64) -> ObservedFile {
    let raw_title = tags.title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    ObservedFile {
        external_uri: path.to_string_lossy().into_owned(),
        raw_title,
        raw_artist: tags.artist,
        raw_album: tags.album,
        raw_genre: tags.genre,
        duration_ms: tags.duration_ms,
        track_number: tags.track_number,
        year: tags.year,
        last_modified,
        unreadable: false,
    }
}
