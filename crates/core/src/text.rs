//! Text normalization and approximate string matching shared by every parser.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-z؀-ۿ\s\-]").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static ARABIC_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[؀-ۿ]").expect("static regex"));

/// Transliterates Eastern-Arabic digits to their ASCII equivalents.
pub fn to_latin_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => {
                char::from_digit(c as u32 - 0x0660, 10).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// Normalizes text for matching: lowercase, ASCII digits, keep Latin/Arabic
/// word characters, digits, spaces and hyphens, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = to_latin_digits(&text.trim().to_lowercase());
    let stripped = NON_WORD.replace_all(&lowered, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

pub fn contains_arabic(text: &str) -> bool {
    ARABIC_SCRIPT.is_match(text)
}

/// Stable display casing for a recognized location. Arabic-script values
/// pass through unmodified.
pub fn title_case_location(location: &str) -> String {
    let trimmed = location.trim();
    if contains_arabic(trimmed) {
        return trimmed.to_string();
    }
    trimmed
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity in [0, 1]. Normalized Damerau-Levenshtein, which behaves well
/// on the short gazetteer entries and typo-heavy user text this crate sees.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_damerau_levenshtein(a, b)
}

/// Best candidate at or above `cutoff`, or `None`.
pub fn best_match<'a, I>(needle: &str, candidates: I, cutoff: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates {
        let score = similarity(needle, candidate);
        if score >= cutoff && best.map_or(true, |(_, prior)| score > prior) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transliterates_arabic_digits() {
        assert_eq!(to_latin_digits("٥ مليون"), "5 مليون");
        assert_eq!(to_latin_digits("١٢٠"), "120");
    }

    #[test]
    fn normalize_folds_case_and_punctuation() {
        assert_eq!(normalize("  Apartment,   in NEW Cairo!! "), "apartment in new cairo");
    }

    #[test]
    fn normalize_keeps_arabic_text() {
        assert_eq!(normalize("شقة في التجمع"), "شقة في التجمع");
    }

    #[test]
    fn normalize_keeps_hyphens() {
        assert_eq!(normalize("3-5M"), "3-5m");
    }

    #[test]
    fn title_case_leaves_arabic_untouched() {
        assert_eq!(title_case_location("القاهرة الجديدة"), "القاهرة الجديدة");
        assert_eq!(title_case_location("new cairo"), "New Cairo");
    }

    #[test]
    fn best_match_respects_cutoff() {
        let gazetteer = ["new cairo", "north coast", "sheikh zayed"];
        assert_eq!(best_match("new ciro", gazetteer, 0.75), Some("new cairo"));
        assert_eq!(best_match("xyzzy", gazetteer, 0.75), None);
    }

    #[test]
    fn best_match_prefers_higher_score() {
        let candidates = ["fifth settlement", "first settlement"];
        assert_eq!(best_match("fifth setlement", candidates, 0.7), Some("fifth settlement"));
    }
}
