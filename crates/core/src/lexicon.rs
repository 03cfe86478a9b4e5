//! Static vocabulary: unit-type synonyms, the location gazetteer and
//! ordinal words. All lookups run on [`crate::text::normalize`]d input.

use once_cell::sync::Lazy;

use crate::state::UnitType;
use crate::text;

/// Synonyms per canonical unit type: English, Arabic and the common typos
/// that show up in real traffic. Multi-word entries must match as
/// substrings before single words, so each list stays longest-first.
pub static UNIT_SYNONYMS: &[(UnitType, &[&str])] = &[
    (
        UnitType::Apartment,
        &[
            "apartment", "apartments", "appartment", "appartments", "apt", "flat",
            "شقة", "شقه", "شقق",
        ],
    ),
    (
        UnitType::Chalet,
        &["chalet", "chalets", "shalet", "shaleet", "شاليه", "شاليهات"],
    ),
    (
        UnitType::Villa,
        &[
            "separate villa", "garden villa", "sky villa", "twin villa",
            "villa", "villas", "vila", "فيلا", "فلل",
        ],
    ),
    (
        UnitType::TownHouse,
        &["town house", "townhouse", "town-home", "تاون هاوس", "تاونهاوس", "تاون"],
    ),
    (
        UnitType::TwinHouse,
        &["twin house", "twinhouse", "توين هاوس", "توينهاوس", "توين"],
    ),
    (
        UnitType::Duplex,
        &["duplex", "duplexes", "duplx", "دوبلكس", "دوبليكس"],
    ),
    (UnitType::Studio, &["studio", "studios", "استوديو"]),
    (
        UnitType::Penthouse,
        &["pent house", "penthouse", "penthous", "بنتهاوس", "بنت هاوس"],
    ),
    (UnitType::Loft, &["loft", "lofts", "لوفت", "لوفتس"]),
    (UnitType::Cabin, &["cabin", "cabins", "كابينة", "كابينه", "كابينات"]),
    (UnitType::Office, &["office", "offices", "مكتب", "مكاتب"]),
];

/// Location gazetteer. Kept verbatim from the listing inventory, quirks
/// included ("fifth settelments" is a known data typo).
pub static GAZETTEER: &[&str] = &[
    // Main areas
    "new cairo",
    "mostakbal city - new cairo",
    "mostakbal city",
    "el shorouk - new cairo",
    "el shorouk",
    "fifth settelments",
    "fifth settlement",
    "fifth district",
    "sheikh zayed",
    "zayed",
    "desert road- sheikh zayed",
    "green belt - sheikh zayed",
    "north coast",
    "ras al hekma",
    "ras el hekma",
    "sidi abdelrahman",
    "ain sokhna",
    "6 october",
    "6th of october",
    "new capital",
    "new administrative capital",
    // Districts and neighborhoods
    "tagamo3",
    "tagamo 3",
    "el tagamo3",
    "rehab",
    "al rehab",
    "madinet nasr",
    "nasr city",
    "heliopolis",
    "masr el gedida",
    "maadi",
    "giza",
    "dokki",
    "mohandessin",
    "agouza",
    "zamalek",
    "garden city",
    "downtown",
    "ramses",
    "haram",
    "faysal",
    "imbaba",
    "shubra",
    "matarya",
    "ain shams",
    "marg",
    "waili",
    "sawah",
    "mokattam",
    "katameya",
    "wadi degla",
    // Compounds
    "marassi",
    "hacienda",
    "mountain view",
    "palm hills",
    "al palm hills",
    "katameya heights",
    "madinaty",
    "rehab city",
    "al rehab city",
    "hyde park",
    "taj city",
    "eastown",
    "waterway",
    "village gate",
    "uptown cairo",
    "creek town",
    "sodic",
    "sodic east",
    "sodic west",
    "east cairo",
    "west cairo",
    "il bosco",
    "the butterfly",
    "the estates",
    "badya",
    "orkidia",
    "zavani",
    "al maqsed",
    "al burouj",
    "la verde",
    "capital prime",
    "de joya",
    "al manara",
    // Sub-areas
    "golf extension",
    "golf area",
    "golden square",
    "petrified forest",
    "first settlement",
    "second settlement",
    "third settlement",
    "fourth settlement",
    "narges",
    "lotus",
    "lotus district",
    "yasmin",
    "yasmin district",
    "banafseg",
    "banafseg district",
    "el banafseg",
];

/// Gazetteer sorted longest-first, so containment checks prefer
/// "mostakbal city - new cairo" over "new cairo".
static GAZETTEER_BY_LENGTH: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut entries: Vec<&str> = GAZETTEER.to_vec();
    entries.sort_by_key(|entry| std::cmp::Reverse(entry.len()));
    entries
});

/// Ordinal words (English + Arabic, with dialect spellings) to 1-based
/// option indexes.
pub static ORDINALS: &[(&str, usize)] = &[
    ("first", 1),
    ("1st", 1),
    ("second", 2),
    ("2nd", 2),
    ("third", 3),
    ("3rd", 3),
    ("fourth", 4),
    ("4th", 4),
    ("fifth", 5),
    ("5th", 5),
    ("اول", 1),
    ("الأول", 1),
    ("الاول", 1),
    ("تاني", 2),
    ("ثاني", 2),
    ("الثاني", 2),
    ("التاني", 2),
    ("تالت", 3),
    ("ثالث", 3),
    ("الثالث", 3),
    ("التالت", 3),
    ("رابع", 4),
    ("الرابع", 4),
    ("خامس", 5),
    ("الخامس", 5),
];

/// Fuzzy cutoffs for gazetteer lookup, tightest for single words where
/// false positives are cheapest to hit.
const CUTOFF_WHOLE: f64 = 0.75;
const CUTOFF_WORD: f64 = 0.80;
const CUTOFF_BIGRAM: f64 = 0.75;
const CUTOFF_TRIGRAM: f64 = 0.72;

/// Resolves `normalized` text to a gazetteer entry, or `None`.
///
/// Cascade: longest containment first, then fuzzy over the whole string,
/// then fuzzy over sliding 1/2/3-word windows.
pub fn lookup_location(normalized: &str) -> Option<&'static str> {
    if normalized.is_empty() {
        return None;
    }

    for entry in GAZETTEER_BY_LENGTH.iter() {
        if normalized.contains(entry) {
            return Some(entry);
        }
    }

    if let Some(entry) = text::best_match(normalized, GAZETTEER.iter().copied(), CUTOFF_WHOLE) {
        return Some(entry);
    }

    let words: Vec<&str> = normalized.split(' ').collect();
    for (i, word) in words.iter().enumerate() {
        if let Some(entry) = text::best_match(word, GAZETTEER.iter().copied(), CUTOFF_WORD) {
            return Some(entry);
        }
        if i + 1 < words.len() {
            let bigram = format!("{} {}", word, words[i + 1]);
            if let Some(entry) = text::best_match(&bigram, GAZETTEER.iter().copied(), CUTOFF_BIGRAM)
            {
                return Some(entry);
            }
        }
        if i + 2 < words.len() {
            let trigram = format!("{} {} {}", word, words[i + 1], words[i + 2]);
            if let Some(entry) =
                text::best_match(&trigram, GAZETTEER.iter().copied(), CUTOFF_TRIGRAM)
            {
                return Some(entry);
            }
        }
    }

    None
}

/// Finds the unit type whose synonym matches `normalized`, preferring
/// longer synonyms so "town house" never resolves as a bare "house" hit.
pub fn lookup_unit_type(normalized: &str) -> Option<UnitType> {
    let mut best: Option<(UnitType, usize)> = None;
    for (unit, synonyms) in UNIT_SYNONYMS {
        for synonym in *synonyms {
            if contains_term(normalized, synonym)
                && best.map_or(true, |(_, len)| synonym.len() > len)
            {
                best = Some((*unit, synonym.len()));
            }
        }
    }
    best.map(|(unit, _)| unit)
}

/// Ordinal word present in `normalized`, as a 1-based index.
pub fn lookup_ordinal(normalized: &str) -> Option<usize> {
    ORDINALS
        .iter()
        .find(|(word, _)| contains_term(normalized, word))
        .map(|(_, index)| *index)
}

/// Whole-term containment. `\b` does not treat Arabic letters as word
/// characters consistently, so boundaries are checked manually.
fn contains_term(haystack: &str, term: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(term) {
        let at = start + pos;
        let end = at + term.len();
        let before_ok = at == 0
            || haystack[..at].chars().next_back().is_some_and(|c| !c.is_alphanumeric());
        let after_ok =
            end == haystack.len() || haystack[end..].chars().next().is_some_and(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize;

    #[test]
    fn containment_prefers_longest_entry() {
        assert_eq!(
            lookup_location(&normalize("somewhere in mostakbal city - new cairo please")),
            Some("mostakbal city - new cairo"),
        );
        assert_eq!(lookup_location(&normalize("new cairo")), Some("new cairo"));
    }

    #[test]
    fn fuzzy_whole_string_recovers_typos() {
        assert_eq!(lookup_location(&normalize("new ciro")), Some("new cairo"));
        assert_eq!(lookup_location(&normalize("shiekh zayed")), Some("sheikh zayed"));
    }

    #[test]
    fn fuzzy_windows_find_embedded_locations() {
        assert_eq!(
            lookup_location(&normalize("i want something in el shoruk if possible")),
            Some("el shorouk"),
        );
    }

    #[test]
    fn unknown_location_returns_none() {
        assert_eq!(lookup_location(&normalize("somewhere quiet and leafy")), None);
    }

    #[test]
    fn unit_synonyms_cover_typos_and_arabic() {
        assert_eq!(lookup_unit_type(&normalize("a nice appartment")), Some(UnitType::Apartment));
        assert_eq!(lookup_unit_type(&normalize("شقة في التجمع")), Some(UnitType::Apartment));
        assert_eq!(lookup_unit_type(&normalize("duplx please")), Some(UnitType::Duplex));
    }

    #[test]
    fn longer_synonym_wins() {
        assert_eq!(lookup_unit_type(&normalize("a twin house with garden")), Some(UnitType::TwinHouse));
        assert_eq!(lookup_unit_type(&normalize("garden villa")), Some(UnitType::Villa));
    }

    #[test]
    fn ordinals_resolve_in_both_languages() {
        assert_eq!(lookup_ordinal(&normalize("the second one")), Some(2));
        assert_eq!(lookup_ordinal(&normalize("التاني")), Some(2));
        assert_eq!(lookup_ordinal(&normalize("number six")), None);
    }

    #[test]
    fn term_containment_requires_boundaries() {
        assert!(!contains_term("apartments4u", "apartment"));
        assert!(contains_term("apartment in maadi", "apartment"));
    }
}
