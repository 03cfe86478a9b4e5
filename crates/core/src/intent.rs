//! Turn intent taxonomy and the rule-based detection cascade.
//!
//! Rules are ordered and first-match-wins; when none fires the caller may
//! consult a fallback classifier, but rule hits are never second-guessed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Restart,
    Compare,
    ConfirmChoice,
    ShowDetails,
    FilterResults,
    SortResults,
    Navigate,
    RefineSearch,
    ShowResults,
    ProvidePreferences,
    Unknown,
}

/// Per-project numeric question, detected independently of the cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitSuperlative {
    CheapestUnit,
    LargestUnit,
}

// Intent matching keeps '#' so "option #2 vs #3" survives normalization.
static INTENT_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s#\-]").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

fn norm(message: &str) -> String {
    let lowered = text::to_latin_digits(&message.trim().to_lowercase());
    let stripped = INTENT_NON_WORD.replace_all(&lowered, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

fn contains_any(t: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| t.contains(p))
}

const RESTART_TRIGGERS: &[&str] = &[
    "restart", "reset", "start over", "new search", "from scratch", "begin again", "clear all",
    "clear filters", "wipe", "reastart", "restar", "restert", "re set", "re-set",
    "ابدأ من جديد", "ابدء من جديد", "ابدا من جديد", "اعادة", "إعادة", "اعاده", "إعاده", "امسح",
    "امسح الكل", "امسح الفلاتر", "ريست", "ريستارت",
];

const COMPARE_TRIGGERS: &[&str] = &[
    "compare", "vs", "versus", "difference", "diff", "قارن", "مقارنة", "الفرق", "فرق",
];

static COMPARE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:option|choice|#)?\s*\d+\s*(?:and|or|vs)\s*(?:option|choice|#)?\s*\d+\b")
        .expect("static regex")
});

const STANDALONE_CONFIRM: &[&str] = &[
    "confirm", "yes", "ok", "okay", "تمام", "موافق", "اوكي", "أوكي", "ايوه", "نعم",
];

static CONFIRM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:i\s+)?(?:want|choose|pick|select|like|prefer)\s+(?:the\s+)?(?:option|choice|#)?\s*(?:\d+|first|second|third|1st|2nd|3rd|this|that)\b",
        r"\b(?:book|reserve|schedule|arrange)\s+(?:the\s+)?(?:option|choice|#)?\s*(?:\d+|first|second|third|1st|2nd|3rd|this|that)?\b",
        r"\b(?:proceed with|confirm|finalize)\b",
        r"\b(?:i'll take|i will take)\b",
        r"\b(?:this one)\s+(?:is\s+)?(?:good|fine|ok|okay|perfect|great)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

const CONFIRM_TRIGGERS_AR: &[&str] = &[
    "اختار", "اختار ده", "عايز ده", "عايز دي", "انا عايز", "انا عاوز", "احجز", "حجز", "حجزلي",
    "احجزلي", "عايز احجز", "تمام كده", "ده مناسب", "دي مناسبة", "ده كويس", "دي كويسة", "أكد",
    "تأكيد", "موافق",
];

static DETAILS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\btell me more\b|\bmore (?:info|information|details)\b|\bdetails\b|\bdescribe\b|\bamenities\b|\bfeatures\b|\bpayment plan\b|\bdown payment\b|تفاصيل|معلومات|احكي|قولي|قوللي|وصف|مميزات|خطة سداد|تقسيط|مقدم)",
    )
    .expect("static regex")
});

const FILTER_TRIGGERS: &[&str] = &[
    "only show", "just show", "remove", "exclude", "filter", "فلتر", "استبعد", "شيل", "اظهر بس",
    "بس",
];

static FILTER_UNIT_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:only|just)\s+(?:apartments|villas|studios|duplexes|chalets|townhouses)\b")
        .expect("static regex")
});
static FILTER_UNIT_AR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:شقق|شقة|فلل|فيلا|شاليهات|شاليه|تاون|توين|دوبلكس|استوديو)\b").expect("static regex")
});
const FILTER_UNIT_AR_QUALIFIERS: &[&str] = &["بس", "فقط", "اظهر", "وريني"];

const SORT_TRIGGERS: &[&str] = &[
    "sort", "sorted", "order by", "cheapest", "most expensive", "lowest price", "highest price",
    "smallest", "largest", "newest", "latest", "رتب", "ترتيب", "اقل سعر", "أقل سعر", "اغلى",
    "أغلى", "ارخص", "أرخص", "من الاقل", "من الأرخص", "من الأغلى", "اكبر", "أكبر", "اصغر", "أصغر",
];

const NAVIGATE_TRIGGERS: &[&str] = &[
    "next", "next page", "more", "show more", "load more", "previous", "prev", "back", "forward",
    "page", "التالي", "اللي بعده", "بعد كده", "اكتر", "المزيد", "السابق", "قبل", "ارجع", "رجوع",
    "صفحة",
];

const REFINE_TRIGGERS: &[&str] = &[
    "bigger", "larger", "more space", "bigger area", "smaller", "less space", "smaller area",
    "cheaper", "lower", "reduce", "decrease", "more expensive", "increase", "raise",
    "higher budget", "change budget", "adjust", "modify", "اكبر", "أكبر", "مساحة اكبر",
    "مساحة أكبر", "اوسع", "اصغر", "أصغر", "مساحة اصغر", "مساحة أصغر", "ارخص", "أرخص", "اقل",
    "أقل", "خفض", "قلل", "اغلى", "أغلى", "زود", "زوّد", "ارفع",
];

const SHOW_RESULTS_TRIGGERS: &[&str] = &[
    "show results", "list options", "show options", "options", "what do you have",
    "what's available", "available", "show me options", "show me results", "give me options",
    "results", "النتايج", "النتائج", "عرض", "وريني", "وريني الاوبشنز", "وريني الخيارات",
    "ايه المتاح", "ايه الموجود", "هات الخيارات", "الخيارات",
];

// Broad search-signal detectors for the default preference branch.
static MONEY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:,\d{3})+|\d{5,9}|\d+(?:\.\d+)?)\b").expect("static regex"));
static MILLION_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\s*(m|million|مليون|م)\b").expect("static regex"));
static AREA_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s*(m2|sqm|متر)\b").expect("static regex"));
static BEDROOM_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s*(bed|beds|bedroom|bedrooms|غرفة|غرف)\b").expect("static regex"));

const MONEY_WORDS: &[&str] = &[
    "egp", "budget", "price", "m", "million", "k", "thousand", "مليون", "م", "جنيه", "ميزانية",
    "سعر",
];
const AREA_WORDS: &[&str] = &["m2", "sqm", "meter", "metre", "متر", "م²", "مساحة"];
const UNIT_WORDS: &[&str] = &[
    "apartment", "apt", "appartment", "flat", "villa", "vila", "townhouse", "town house",
    "duplex", "duplx", "studio", "chalet", "shalet", "شقة", "شقه", "فيلا", "توين", "تاون",
    "دوبلكس", "استوديو", "شاليه",
];
const LOCATION_WORDS: &[&str] = &[
    "new cairo", "tagamo", "tagamo3", "fifth settlement", "rehab", "katameya", "mostakbal",
    "shorouk", "sheikh zayed", "zayed", "6 october", "october", "north coast", "sahel",
    "ain sokhna", "sokhna", "ras el hekma", "sidi abdelrahman", "القاهرة الجديدة", "التجمع",
    "الرحاب", "مدينتي", "الشروق", "المستقبل", "الشيخ زايد", "زايد", "اكتوبر", "٦ اكتوبر",
    "الساحل", "السخنة", "راس الحكمة", "سيدي عبدالرحمن",
];

fn has_search_signals(t: &str) -> bool {
    let has_money = MONEY_NUMBER.is_match(t) && contains_any(t, MONEY_WORDS);
    has_money
        || MILLION_WORD.is_match(t)
        || contains_any(t, AREA_WORDS)
        || AREA_NUMBER.is_match(t)
        || contains_any(t, UNIT_WORDS)
        || BEDROOM_NUMBER.is_match(t)
        || contains_any(t, LOCATION_WORDS)
}

fn is_compare(t: &str) -> bool {
    contains_any(t, COMPARE_TRIGGERS) || COMPARE_NUMERIC.is_match(t)
}

fn is_confirm(t: &str) -> bool {
    CONFIRM_PATTERNS.iter().any(|p| p.is_match(t)) || contains_any(t, CONFIRM_TRIGGERS_AR)
}

fn is_filter(t: &str) -> bool {
    contains_any(t, FILTER_TRIGGERS)
        || FILTER_UNIT_EN.is_match(t)
        || (FILTER_UNIT_AR.is_match(t) && contains_any(t, FILTER_UNIT_AR_QUALIFIERS))
}

/// Ordered rule cascade, first match wins. Returns `None` when no rule
/// fires so the caller can consult a fallback classifier.
pub fn detect_rules(message: &str) -> Option<Intent> {
    let t = norm(message);
    if t.is_empty() {
        return None;
    }

    if contains_any(&t, RESTART_TRIGGERS) {
        return Some(Intent::Restart);
    }
    if is_compare(&t) {
        return Some(Intent::Compare);
    }
    if is_confirm(&t) || STANDALONE_CONFIRM.contains(&t.as_str()) {
        return Some(Intent::ConfirmChoice);
    }
    if DETAILS_PATTERN.is_match(&t) {
        return Some(Intent::ShowDetails);
    }
    if is_filter(&t) {
        return Some(Intent::FilterResults);
    }
    if contains_any(&t, SORT_TRIGGERS) {
        return Some(Intent::SortResults);
    }
    if contains_any(&t, NAVIGATE_TRIGGERS) {
        return Some(Intent::Navigate);
    }
    if contains_any(&t, REFINE_TRIGGERS) {
        return Some(Intent::RefineSearch);
    }
    if contains_any(&t, SHOW_RESULTS_TRIGGERS) {
        return Some(Intent::ShowResults);
    }
    if has_search_signals(&t) {
        return Some(Intent::ProvidePreferences);
    }
    None
}

const LARGEST_TRIGGERS: &[&str] =
    &["largest unit", "biggest unit", "max area", "largest option"];
const CHEAPEST_TRIGGERS: &[&str] =
    &["cheapest", "lowest price", "min price", "cheapest unit", "cheapest option"];

/// Detects "cheapest unit" / "largest unit" style questions about one
/// project. Checked before the compare branch in the orchestrator.
pub fn detect_unit_superlative(message: &str) -> Option<UnitSuperlative> {
    let t = norm(message);
    if contains_any(&t, LARGEST_TRIGGERS) {
        return Some(UnitSuperlative::LargestUnit);
    }
    if contains_any(&t, CHEAPEST_TRIGGERS) {
        return Some(UnitSuperlative::CheapestUnit);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_beats_everything() {
        assert_eq!(detect_rules("reset and show me villas"), Some(Intent::Restart));
        assert_eq!(detect_rules("ابدأ من جديد"), Some(Intent::Restart));
    }

    #[test]
    fn numeric_compare_without_the_word() {
        assert_eq!(detect_rules("option 1 vs option 2"), Some(Intent::Compare));
        assert_eq!(detect_rules("1 and 2"), Some(Intent::Compare));
        assert_eq!(detect_rules("قارن بين المشروعين"), Some(Intent::Compare));
    }

    #[test]
    fn confirm_variants() {
        assert_eq!(detect_rules("I want option 2"), Some(Intent::ConfirmChoice));
        assert_eq!(detect_rules("book the first one"), Some(Intent::ConfirmChoice));
        assert_eq!(detect_rules("yes"), Some(Intent::ConfirmChoice));
        assert_eq!(detect_rules("تمام"), Some(Intent::ConfirmChoice));
    }

    #[test]
    fn details_filter_sort_navigate() {
        assert_eq!(detect_rules("tell me more about it"), Some(Intent::ShowDetails));
        assert_eq!(detect_rules("only show apartments"), Some(Intent::FilterResults));
        assert_eq!(detect_rules("sort by lowest price"), Some(Intent::SortResults));
        assert_eq!(detect_rules("next page"), Some(Intent::Navigate));
    }

    #[test]
    fn refine_and_show_results() {
        assert_eq!(detect_rules("something cheaper"), Some(Intent::RefineSearch));
        assert_eq!(detect_rules("اوسع شوية"), Some(Intent::RefineSearch));
        assert_eq!(detect_rules("show results"), Some(Intent::ShowResults));
    }

    #[test]
    fn search_signals_default_to_preferences() {
        assert_eq!(detect_rules("3 bedroom villa in zayed"), Some(Intent::ProvidePreferences));
        assert_eq!(detect_rules("my budget is 5 million"), Some(Intent::ProvidePreferences));
        assert_eq!(detect_rules("شقة في التجمع"), Some(Intent::ProvidePreferences));
    }

    #[test]
    fn no_rule_returns_none() {
        assert_eq!(detect_rules("what is the weather like"), None);
        assert_eq!(detect_rules(""), None);
    }

    #[test]
    fn unit_superlatives() {
        assert_eq!(
            detect_unit_superlative("cheapest unit in project 12"),
            Some(UnitSuperlative::CheapestUnit),
        );
        assert_eq!(
            detect_unit_superlative("what's the largest unit"),
            Some(UnitSuperlative::LargestUnit),
        );
        assert_eq!(detect_unit_superlative("show details"), None);
    }
}
