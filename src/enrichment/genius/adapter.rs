//! Adapter layer: Convert Genius DTOs and song pages to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! Song-page scraping lives here too: if Genius changes its markup, only
//! this file needs to change.

use once_cell::sync::Lazy;
use regex::Regex;

use super::dto;
use crate::enrichment::domain::MatchCandidate;

/// Attribute that marks a lyrics block on a song page
const LYRICS_CONTAINER: &str = r#"data-lyrics-container="true""#;
/// Attribute on headers/ads nested inside lyrics blocks
const EXCLUDED_BLOCK: &str = r#"data-exclude-from-selection="true""#;

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").unwrap());
static OG_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta[^>]*property="og:image"[^>]*content="([^"]+)"|<meta[^>]*content="([^"]+)"[^>]*property="og:image""#)
        .unwrap()
});

/// Convert a search response into candidates, keeping the source's order.
pub fn to_candidates(response: dto::SearchResponse) -> Vec<MatchCandidate> {
    response
        .hits
        .into_iter()
        .filter(|hit| hit.hit_type == "song")
        .map(|hit| {
            let song = hit.result;
            MatchCandidate {
                external_id: song.id.to_string(),
                title: song.title,
                artist_name: song.primary_artist.map(|a| a.name),
                url: song.url,
                cover_art_url: song.song_art_image_url.filter(|u| !is_placeholder_art(u)),
            }
        })
        .collect()
}

/// Pull plain-text lyrics out of a song page. `None` when the page has no
/// lyrics blocks or they are empty (instrumentals).
pub fn extract_lyrics(html: &str) -> Option<String> {
    let mut sections = Vec::new();
    let mut rest = html;

    while let Some(pos) = rest.find(LYRICS_CONTAINER) {
        let after = &rest[pos..];
        let Some(open_end) = after.find('>') else {
            break;
        };
        let body = &after[open_end + 1..];
        let end = matching_div_end(body);
        let section = html_to_text(&strip_blocks(&body[..end], EXCLUDED_BLOCK));
        if !section.is_empty() {
            sections.push(section);
        }
        rest = &body[end..];
    }

    let lyrics = sections.join("\n");
    (!lyrics.trim().is_empty()).then_some(lyrics)
}

/// The page's `og:image`, which is the full-size song art.
pub fn extract_cover_art(html: &str) -> Option<String> {
    OG_IMAGE
        .captures(html)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| decode_entities(m.as_str()))
        .filter(|url| !is_placeholder_art(url))
}

/// Genius serves a generic image for songs without art.
fn is_placeholder_art(url: &str) -> bool {
    url.contains("default_cover_image") || url.contains("default_avatar")
}

/// Byte offset of the `</div` closing the block whose body starts at 0.
fn matching_div_end(body: &str) -> usize {
    let mut depth = 1usize;
    let mut i = 0;
    while let Some(offset) = body[i..].find('<') {
        let at = i + offset;
        let tail = &body[at..];
        if tail.starts_with("</div") {
            depth -= 1;
            if depth == 0 {
                return at;
            }
        } else if tail.starts_with("<div") {
            depth += 1;
        }
        i = at + 1;
    }
    body.len()
}

/// Remove every `<div>` block whose opening tag contains `marker`.
fn strip_blocks(html: &str, marker: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(marker) {
        let Some(open_start) = rest[..pos].rfind("<div") else {
            break;
        };
        let Some(open_len) = rest[pos..].find('>') else {
            break;
        };
        out.push_str(&rest[..open_start]);
        let body = &rest[pos + open_len + 1..];
        let end = matching_div_end(body);
        // Skip past the closing "</div>" too
        let close = body[end..].find('>').map_or(body.len(), |c| end + c + 1);
        rest = &body[close..];
    }
    out.push_str(rest);
    out
}

fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK.replace_all(html, "\n");
    let text = TAG.replace_all(&text, "");
    decode_entities(&text)
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_entities(s: &str) -> String {
    let s = NUMERIC_ENTITY.replace_all(s, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: u64, title: &str, artist: &str) -> dto::Hit {
        dto::Hit {
            hit_type: "song".to_string(),
            result: dto::Song {
                id,
                title: title.to_string(),
                url: format!("https://genius.com/{id}"),
                primary_artist: Some(dto::Artist {
                    id: 1,
                    name: artist.to_string(),
                }),
                song_art_image_url: Some(format!("https://images.genius.com/{id}.jpg")),
                header_image_url: None,
            },
        }
    }

    #[test]
    fn test_to_candidates_keeps_order() {
        let response = dto::SearchResponse {
            hits: vec![song(1, "First", "A"), song(2, "Second", "B")],
        };
        let candidates = to_candidates(response);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].external_id, "1");
        assert_eq!(candidates[0].artist_name.as_deref(), Some("A"));
        assert_eq!(candidates[1].title, "Second");
        assert_eq!(
            candidates[1].cover_art_url.as_deref(),
            Some("https://images.genius.com/2.jpg")
        );
    }

    #[test]
    fn test_to_candidates_skips_non_songs() {
        let mut other = song(3, "Some Article", "Genius");
        other.hit_type = "article".to_string();
        let response = dto::SearchResponse {
            hits: vec![other, song(4, "Song", "Artist")],
        };
        let candidates = to_candidates(response);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].external_id, "4");
    }

    #[test]
    fn test_placeholder_art_dropped() {
        let mut hit = song(5, "Song", "Artist");
        hit.result.song_art_image_url =
            Some("https://assets.genius.com/images/default_cover_image.png".to_string());
        let candidates = to_candidates(dto::SearchResponse { hits: vec![hit] });
        assert!(candidates[0].cover_art_url.is_none());
    }

    #[test]
    fn test_extract_lyrics() {
        let html = r#"<html><body>
            <div data-lyrics-container="true" class="Lyrics__Container">
                <div data-exclude-from-selection="true"><span>12 Contributors</span></div>
                [Intro]<br/>Is this the real life?<br>Is this just <i>fantasy</i>?
            </div>
            <div class="ad">buy stuff</div>
            <div data-lyrics-container="true">Caught in a landslide<br/>No escape from reality</div>
        </body></html>"#;

        let lyrics = extract_lyrics(html).unwrap();
        assert_eq!(
            lyrics,
            "[Intro]\nIs this the real life?\nIs this just fantasy?\nCaught in a landslide\nNo escape from reality"
        );
        assert!(!lyrics.contains("Contributors"));
        assert!(!lyrics.contains("buy stuff"));
    }

    #[test]
    fn test_extract_lyrics_entities() {
        let html = r#"<div data-lyrics-container="true">Rock &amp; roll &#x27;til &#39;dawn&#39; &quot;now&quot;</div>"#;
        assert_eq!(
            extract_lyrics(html).as_deref(),
            Some("Rock & roll 'til 'dawn' \"now\"")
        );
    }

    #[test]
    fn test_extract_lyrics_missing() {
        assert_eq!(extract_lyrics("<html><body>No lyrics here</body></html>"), None);
        assert_eq!(
            extract_lyrics(r#"<div data-lyrics-container="true">   </div>"#),
            None
        );
    }

    #[test]
    fn test_extract_cover_art() {
        let html = r#"<head><meta property="og:image" content="https://images.genius.com/abc.1000x1000x1.jpg" /></head>"#;
        assert_eq!(
            extract_cover_art(html).as_deref(),
            Some("https://images.genius.com/abc.1000x1000x1.jpg")
        );

        let reversed = r#"<meta content="https://images.genius.com/x.png" property="og:image">"#;
        assert_eq!(
            extract_cover_art(reversed).as_deref(),
            Some("https://images.genius.com/x.png")
        );

        assert_eq!(extract_cover_art("<head></head>"), None);
    }
}
