//! Title normalization: turns a raw, messy title string (often a file name
//! or a video title) into a clean `{artist, title, version_tag}` triple.
//!
//! # Pipeline
//!
//! 1. Separator tokens (`|`, `||`, `//`, `::`, `\`, en/em dashes, spaced
//!    `/`) are rewritten to a canonical ` - `; whitespace is collapsed
//! 2. Configured decoration patterns ("(Official Video)", "[HD]", site
//!    tags, track-number prefixes) are removed until none match
//! 3. The string is split on the first dash separator; the side that
//!    better matches the artist hint becomes the artist
//! 4. Without a separator, the hint (if any) is the artist
//! 5. Otherwise the artist is the "Unknown Artist" sentinel
//! 6. A trailing version marker ("(Live)", "- Remastered") is moved into
//!    `version_tag`
//! 7. Artist, title and tag are title-cased
//!
//! Parsing is total and idempotent: `parse(parse(x).format())` equals
//! `parse(x)`.

mod case;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::NormalizerConfig;
use crate::error::{Error, Result};
use crate::similarity::match_score;

pub use case::title_case;

/// Multi-character and dash-like separators, rewritten to " - ".
static SEPARATOR_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\|\||//|::|\||\\|[\u{2013}\u{2014}])\s*").unwrap());

/// A slash only separates when whitespace-flanked ("AC/DC" is a name).
static SPACED_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+/\s+").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A dash separates only with whitespace on at least one side ("Jay-Z").
static DASH_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+-+\s*|\s*-+\s+").unwrap());

/// Hints that carry no information.
const PLACEHOLDER_HINTS: &[&str] = &["", "<unknown>", "unknown", "unknown artist"];

/// Output of [`TitleNormalizer::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    /// Artist name, or the unknown-artist sentinel
    pub artist: String,
    /// Title without decorations or version marker
    pub title: String,
    /// Extracted version/edition marker ("Live", "Remastered")
    pub version_tag: Option<String>,
}

impl ParsedTitle {
    /// Render back into a single "Artist - Title (Version)" string.
    pub fn format(&self) -> String {
        match &self.version_tag {
            Some(tag) => format!("{} - {} ({})", self.artist, self.title, tag),
            None => format!("{} - {}", self.artist, self.title),
        }
    }
}

/// Parses raw title strings according to a [`NormalizerConfig`].
#[derive(Debug, Clone)]
pub struct TitleNormalizer {
    decorations: Vec<Regex>,
    bracket_version: Option<Regex>,
    dash_version: Option<Regex>,
    artist_confidence: f32,
    unknown_artist: String,
    unknown_title: String,
}

impl TitleNormalizer {
    /// Compile the configured patterns.
    ///
    /// Fails only if a configured decoration pattern is not a valid regex.
    pub fn new(config: &NormalizerConfig) -> Result<Self> {
        let decorations = config
            .decoration_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| Error::config(format!("invalid decoration pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let keywords = keyword_alternation(&config.version_keywords);
        let (bracket_version, dash_version) = if keywords.is_empty() {
            (None, None)
        } else {
            let bracket = format!(
                r"(?i)\s*[\(\[]\s*([^\(\)\[\]]*?\b(?:{keywords})\b[^\(\)\[\]]*?)\s*[\)\]]\s*$"
            );
            let dash = format!(r"(?i)\s+-+\s+([^-]*?\b(?:{keywords})\b[^-]*?)\s*$");
            let compile = |p: &str| {
                Regex::new(p).map_err(|e| Error::config(format!("invalid version keywords: {e}")))
            };
            (Some(compile(&bracket)?), Some(compile(&dash)?))
        };

        Ok(Self {
            decorations,
            bracket_version,
            dash_version,
            artist_confidence: config.artist_confidence,
            unknown_artist: config.unknown_artist.clone(),
            unknown_title: config.unknown_title.clone(),
        })
    }

    /// Parse a raw title, optionally guided by a raw artist tag.
    pub fn parse(&self, raw_title: &str, raw_artist_hint: Option<&str>) -> ParsedTitle {
        let hint = raw_artist_hint
            .map(|h| self.clean(h))
            .filter(|h| !self.is_placeholder(h));
        let cleaned = self.clean(raw_title);

        if cleaned.is_empty() {
            let artist = hint.map_or_else(String::new, |h| title_case(&h));
            return ParsedTitle {
                artist: non_empty_or(artist, &self.unknown_artist),
                title: self.unknown_title.clone(),
                version_tag: None,
            };
        }

        let (artist, title_part) = match split_on_separator(&cleaned) {
            Some((left, right)) => match &hint {
                Some(h) if self.right_side_is_artist(left, right, h) => {
                    (right.to_string(), left.to_string())
                }
                _ => (left.to_string(), right.to_string()),
            },
            None => match hint {
                Some(h) => (h, cleaned.clone()),
                None => (self.unknown_artist.clone(), cleaned.clone()),
            },
        };

        let (title, version_tag) = self.extract_version(&title_part);

        ParsedTitle {
            artist: non_empty_or(title_case(&artist), &self.unknown_artist),
            title: non_empty_or(title_case(&title), &self.unknown_title),
            version_tag: version_tag.map(|t| title_case(&t)).filter(|t| !t.is_empty()),
        }
    }

    /// Clean a free-text field (album, genre) without artist/title splitting.
    pub fn clean_field(&self, raw: &str) -> Option<String> {
        let cleaned = title_case(&self.clean(raw));
        (!cleaned.is_empty()).then_some(cleaned)
    }

    /// Steps 1 and 2: canonical separators, decorations removed.
    fn clean(&self, raw: &str) -> String {
        let s = raw.replace('_', " ");
        let s = SEPARATOR_TOKENS.replace_all(&s, " - ");
        let s = SPACED_SLASH.replace_all(&s, " - ");
        let mut s = collapse(&s);

        // Removing one decoration can expose another; run to a fixpoint.
        loop {
            let mut next = s.clone();
            for pattern in &self.decorations {
                next = pattern.replace_all(&next, " ").into_owned();
            }
            let next = collapse(&next);
            if next == s {
                break;
            }
            s = next;
        }
        s
    }

    fn is_placeholder(&self, hint: &str) -> bool {
        let lower = hint.to_lowercase();
        PLACEHOLDER_HINTS.contains(&lower.as_str()) || lower == self.unknown_artist.to_lowercase()
    }

    /// The artist is whichever side matches the hint confidently, else
    /// whichever matches better; ties stay with the left side. A sentinel
    /// on either side pins the artist to the left.
    fn right_side_is_artist(&self, left: &str, right: &str, hint: &str) -> bool {
        if left.eq_ignore_ascii_case(&self.unknown_artist)
            || right.eq_ignore_ascii_case(&self.unknown_title)
        {
            return false;
        }
        let left_score = match_score(left, hint);
        let right_score = match_score(right, hint);

        if left_score >= self.artist_confidence {
            false
        } else if right_score >= self.artist_confidence {
            true
        } else {
            right_score > left_score
        }
    }

    /// Step 6: split a trailing version marker off the title.
    fn extract_version(&self, title: &str) -> (String, Option<String>) {
        for pattern in [&self.bracket_version, &self.dash_version].into_iter().flatten() {
            if let Some(caps) = pattern.captures(title) {
                let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let rest = trim_separators(&title[..whole.start()]);
                return (rest.to_string(), Some(tag.as_str().trim().to_string()));
            }
        }
        (title.to_string(), None)
    }
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default()).expect("default normalizer patterns compile")
    }
}

/// Split on the first dash separator; both sides must be non-empty.
fn split_on_separator(s: &str) -> Option<(&str, &str)> {
    let m = DASH_SEPARATOR.find(s)?;
    let left = trim_separators(&s[..m.start()]);
    let right = trim_separators(&s[m.end()..]);
    (!left.is_empty() && !right.is_empty()).then_some((left, right))
}

fn keyword_alternation(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

fn collapse(s: &str) -> String {
    trim_separators(&WHITESPACE.replace_all(s, " ")).to_string()
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| c == '-' || c.is_whitespace())
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str, hint: Option<&str>) -> ParsedTitle {
        TitleNormalizer::default().parse(raw, hint)
    }

    #[test]
    fn test_artist_title_with_decoration() {
        let parsed = parse("Queen - Bohemian Rhapsody (Official Video)", None);
        assert_eq!(parsed.artist, "Queen");
        assert_eq!(parsed.title, "Bohemian Rhapsody");
        assert_eq!(parsed.version_tag, None);
    }

    #[test]
    fn test_separator_variants() {
        for raw in [
            "Queen | Bohemian Rhapsody",
            "Queen || Bohemian Rhapsody",
            "Queen // Bohemian Rhapsody",
            "Queen :: Bohemian Rhapsody",
            "Queen \u{2013} Bohemian Rhapsody",
            "Queen\u{2014}Bohemian Rhapsody",
            "Queen / Bohemian Rhapsody",
            "Queen_-_Bohemian_Rhapsody",
        ] {
            let parsed = parse(raw, None);
            assert_eq!(parsed.artist, "Queen", "input: {raw}");
            assert_eq!(parsed.title, "Bohemian Rhapsody", "input: {raw}");
        }
    }

    #[test]
    fn test_names_with_inner_punctuation_survive() {
        let parsed = parse("AC/DC - Thunderstruck", None);
        assert_eq!(parsed.artist, "AC/DC");
        assert_eq!(parsed.title, "Thunderstruck");

        let parsed = parse("Jay-Z - Empire State of Mind", None);
        assert_eq!(parsed.artist, "Jay-Z");
        assert_eq!(parsed.title, "Empire State of Mind");
    }

    #[test]
    fn test_hint_picks_right_side() {
        let parsed = parse("Bohemian Rhapsody - Queen", Some("Queen"));
        assert_eq!(parsed.artist, "Queen");
        assert_eq!(parsed.title, "Bohemian Rhapsody");
    }

    #[test]
    fn test_hint_confident_left_side_wins() {
        let parsed = parse("Queen - Queen of the Night", Some("Queen"));
        assert_eq!(parsed.artist, "Queen");
        assert_eq!(parsed.title, "Queen of the Night");
    }

    #[test]
    fn test_hint_without_separator() {
        let parsed = parse("Bohemian Rhapsody", Some("queen"));
        assert_eq!(parsed.artist, "Queen");
        assert_eq!(parsed.title, "Bohemian Rhapsody");
    }

    #[test]
    fn test_placeholder_hint_ignored() {
        let parsed = parse("Bohemian Rhapsody", Some("<unknown>"));
        assert_eq!(parsed.artist, "Unknown Artist");
        assert_eq!(parsed.title, "Bohemian Rhapsody");
    }

    #[test]
    fn test_no_separator_no_hint() {
        let parsed = parse("some song title", None);
        assert_eq!(parsed.artist, "Unknown Artist");
        assert_eq!(parsed.title, "Some Song Title");
    }

    #[test]
    fn test_empty_input_uses_sentinels() {
        for raw in ["", "   ", "(Official Video)", "[HD]", " - "] {
            let parsed = parse(raw, None);
            assert_eq!(parsed.artist, "Unknown Artist", "input: {raw:?}");
            assert_eq!(parsed.title, "Unknown Title", "input: {raw:?}");
        }
    }

    #[test]
    fn test_empty_title_takes_artist_from_hint() {
        let normalizer = TitleNormalizer::default();
        for raw in ["", "(Official Video)", "[HD]"] {
            let parsed = normalizer.parse(raw, Some("queen"));
            assert_eq!(parsed.artist, "Queen", "input: {raw:?}");
            assert_eq!(parsed.title, "Unknown Title", "input: {raw:?}");

            let again = normalizer.parse(&parsed.format(), Some("queen"));
            assert_eq!(again, parsed, "input: {raw:?}");
        }
    }

    #[test]
    fn test_sentinel_side_stays_put() {
        let parsed = parse("Unknown Artist - Bohemian Rhapsody", Some("Bohemian"));
        assert_eq!(parsed.artist, "Unknown Artist");
        assert_eq!(parsed.title, "Bohemian Rhapsody");
    }

    #[test]
    fn test_version_tag_bracketed() {
        let parsed = parse("Nirvana - Lake of Fire (Live)", None);
        assert_eq!(parsed.title, "Lake of Fire");
        assert_eq!(parsed.version_tag.as_deref(), Some("Live"));

        let parsed = parse("Daft Punk - One More Time [radio edit]", None);
        assert_eq!(parsed.title, "One More Time");
        assert_eq!(parsed.version_tag.as_deref(), Some("Radio Edit"));
    }

    #[test]
    fn test_version_tag_dash_form() {
        let parsed = parse("Queen - Bohemian Rhapsody - Remastered 2011", None);
        assert_eq!(parsed.artist, "Queen");
        assert_eq!(parsed.title, "Bohemian Rhapsody");
        assert_eq!(parsed.version_tag.as_deref(), Some("Remastered 2011"));
    }

    #[test]
    fn test_non_version_brackets_kept() {
        let parsed = parse("Artist - Song (Part 2)", None);
        assert_eq!(parsed.title, "Song (Part 2)");
        assert_eq!(parsed.version_tag, None);
    }

    #[test]
    fn test_site_tags_and_track_numbers_removed() {
        let parsed = parse("[www.freemp3.com] 03. Artist - Song.mp3", None);
        assert_eq!(parsed.artist, "Artist");
        assert_eq!(parsed.title, "Song");

        let parsed = parse("Artist - Song - mp3site.net", None);
        assert_eq!(parsed.title, "Song");
    }

    #[test]
    fn test_capitalization_pass() {
        let parsed = parse("the beatles - a day in the life", None);
        assert_eq!(parsed.artist, "The Beatles");
        assert_eq!(parsed.title, "A Day in the Life");

        let parsed = parse("ABBA - SOS", None);
        assert_eq!(parsed.artist, "ABBA");
        assert_eq!(parsed.title, "SOS");
    }

    #[test]
    fn test_format_roundtrip_is_stable() {
        let normalizer = TitleNormalizer::default();
        for (raw, hint) in [
            ("Queen - Bohemian Rhapsody (Official Video)", None),
            ("Lake of Fire (Live) - Nirvana", Some("Nirvana")),
            ("just a title", None),
            ("", None),
            ("Artist - (Live)", None),
        ] {
            let first = normalizer.parse(raw, hint);
            let second = normalizer.parse(&first.format(), hint);
            assert_eq!(first, second, "input: {raw:?}");
        }
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let config = NormalizerConfig {
            decoration_patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        let err = TitleNormalizer::new(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_clean_field() {
        let normalizer = TitleNormalizer::default();
        assert_eq!(
            normalizer.clean_field("a night at the opera"),
            Some("A Night at the Opera".to_string())
        );
        assert_eq!(normalizer.clean_field("  "), None);
    }
}
