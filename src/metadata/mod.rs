//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent metadata access across MP3,
//! FLAC, OGG/Opus, M4A and WAV. Values are returned raw; normalization is
//! the catalog's job.

use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;

use crate::error::{Error, Result};

/// Raw tag values and stream properties of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
    pub year: Option<i32>,
    pub duration_ms: u64,
}

/// Read tags and duration. Blank tag values come back as `None`.
pub fn read(path: &Path) -> Result<FileTags> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

    let duration_ms = tagged_file.properties().duration().as_millis() as u64;

    // Get the primary tag, or fall back to the first available tag
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(FileTags {
            duration_ms,
            ..Default::default()
        });
    };

    Ok(FileTags {
        title: non_blank(tag.title()),
        artist: non_blank(tag.artist()),
        album: non_blank(tag.album()),
        genre: non_blank(tag.genre()),
        track_number: tag.track().filter(|n| *n > 0),
        year: tag.year().and_then(|y| i32::try_from(y).ok()).filter(|y| *y > 0),
        duration_ms,
    })
}

fn non_blank(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write to temp file");

        let result = read(file.path());
        assert!(matches!(result, Err(Error::Metadata { .. })));
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        let path = Path::new("non_existent_file.mp3");
        let result = read(path);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Queen ".into())), Some("Queen".to_string()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
