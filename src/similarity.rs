//! String similarity scoring for titles and artist names.
//!
//! Two complementary measures, both normalized to `[0.0, 1.0]`:
//! - [`similarity`]: character-level, normalized Levenshtein distance over
//!   the lowercase alphanumeric content of each string
//! - [`token_similarity`]: word-level Jaccard overlap, which tolerates
//!   reordering ("Beatles, The" vs "The Beatles")
//!
//! [`match_score`] combines them and is what the normalizer and the
//! resolver use for their threshold decisions.
//!
//! Every function here is total: empty or punctuation-only input scores 0.

use std::collections::HashSet;

/// Character-level similarity (0.0-1.0).
///
/// Both strings are reduced to lowercase alphanumerics before comparison,
/// so case, whitespace and punctuation never count as edits.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a = clean(a);
    let b = clean(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let distance = levenshtein_distance(&a, &b);
    let max_len = a.len().max(b.len());
    1.0 - (distance as f32 / max_len as f32)
}

/// Word-level Jaccard similarity (0.0-1.0).
///
/// Tokens are maximal runs of alphanumeric characters, lowercased.
pub fn token_similarity(a: &str, b: &str) -> f32 {
    let a = tokens(a);
    let b = tokens(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let shared = a.intersection(&b).count();
    let total = a.union(&b).count();
    shared as f32 / total as f32
}

/// Best of [`similarity`] and [`token_similarity`].
pub fn match_score(a: &str, b: &str) -> f32 {
    similarity(a, b).max(token_similarity(a, b))
}

/// Split a string into its lowercase alphanumeric tokens, in order.
pub fn token_list(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn tokens(s: &str) -> HashSet<String> {
    token_list(s).into_iter().collect()
}

/// Lowercase alphanumeric content as chars.
fn clean(s: &str) -> Vec<char> {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Levenshtein distance with a two-row table.
fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(similarity("Queen", "Queen"), 1.0);
        assert_eq!(similarity("hello", "HELLO"), 1.0);
    }

    #[test]
    fn test_empty_strings_score_zero() {
        assert_eq!(similarity("", "Queen"), 0.0);
        assert_eq!(similarity("Queen", ""), 0.0);
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("!!!", "???"), 0.0);
        assert_eq!(token_similarity("", "Queen"), 0.0);
    }

    #[test]
    fn test_punctuation_ignored() {
        assert_eq!(similarity("AC/DC", "acdc"), 1.0);
        assert_eq!(similarity("Guns N' Roses", "guns n roses"), 1.0);
    }

    #[test]
    fn test_levenshtein_distance() {
        let d = |a: &str, b: &str| {
            levenshtein_distance(
                &a.chars().collect::<Vec<_>>(),
                &b.chars().collect::<Vec<_>>(),
            )
        };
        assert_eq!(d("kitten", "sitting"), 3);
        assert_eq!(d("", "abc"), 3);
        assert_eq!(d("flaw", "lawn"), 2);
        assert_eq!(d("same", "same"), 0);
    }

    #[test]
    fn test_partial_similarity() {
        // 8 extra chars over a 24 char string
        let score = similarity("Bohemian Rhapsody - Remaster", "Bohemian Rhapsody");
        assert!((score - (1.0 - 8.0 / 24.0)).abs() < 0.001);
        assert!(similarity("completely different", "nothing alike") < 0.4);
    }

    #[test]
    fn test_token_similarity_handles_reordering() {
        assert_eq!(token_similarity("Artist, The", "The Artist"), 1.0);
        assert!(similarity("Artist, The", "The Artist") < 0.5);
        assert_eq!(match_score("Artist, The", "The Artist"), 1.0);
    }

    #[test]
    fn test_token_similarity_partial_overlap() {
        // {a, b} vs {b, c} -> 1 shared of 3
        let score = token_similarity("alpha beta", "beta gamma");
        assert!((score - 1.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_token_list() {
        assert_eq!(
            token_list("Live at Wembley '86!"),
            vec!["live", "at", "wembley", "86"]
        );
    }

    #[test]
    fn test_unicode_lowercase() {
        assert_eq!(similarity("BJÖRK", "björk"), 1.0);
    }
}
