//! Title-case pass for normalized artist and title strings.

/// Words kept lowercase unless they open the string.
const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "nor", "for", "so", "yet", "as", "at", "by", "in",
    "of", "off", "on", "per", "to", "up", "via", "vs", "from", "into", "with",
];

/// Capitalize each word of `s`.
///
/// - the first alphabetic character of every word is uppercased, the rest
///   of the word is left alone ("McCartney" survives)
/// - function words are lowercased unless they are the first word
/// - all-caps tokens of two or more letters (acronyms) and tokens
///   containing a dot (domains, initials) are kept verbatim
///
/// The pass is idempotent.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .enumerate()
        .map(|(i, word)| capitalize_word(word, i == 0))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_word(word: &str, first: bool) -> String {
    if word.contains('.') || is_acronym(word) {
        return word.to_string();
    }

    let bare: String = word
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    if !first && FUNCTION_WORDS.contains(&bare.as_str()) {
        return word.to_lowercase();
    }

    let mut out = String::with_capacity(word.len());
    let mut done = false;
    for c in word.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn is_acronym(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}
