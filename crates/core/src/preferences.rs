//! Deterministic preference extraction: free text in, sparse [`StatePatch`]
//! out. Bilingual (English + Egyptian Arabic), typo-tolerant, and entirely
//! rule-based so its output can override fallback-classifier entities.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexicon;
use crate::state::{
    Features, FloorType, Furnishing, PaymentPlan, SizePreference, StatePatch, UnitType, ViewType,
};
use crate::state::Field;
use crate::text;

const MILLION: &str = "million|m|مليون|م";

/// Money/area texts keep decimal points, so they skip the punctuation
/// strip: lowercase, ASCII digits, commas to spaces, collapsed whitespace.
fn numeric_text(text: &str) -> String {
    let lowered = text::to_latin_digits(&text.trim().to_lowercase()).replace(',', " ");
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

static BUDGET_RANGES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(
            r"(?:between|بين)\s+(?P<v1>\d+(?:\.\d+)?)\s*(?P<u1>{MILLION})?\s+(?:and|و)\s+(?P<v2>\d+(?:\.\d+)?)\s*(?P<u2>{MILLION})?"
        ),
        format!(
            r"(?:from|من)\s+(?P<v1>\d+(?:\.\d+)?)\s*(?P<u1>{MILLION})?\s+(?:to|ل|الى|إلى)\s+(?P<v2>\d+(?:\.\d+)?)\s*(?P<u2>{MILLION})?"
        ),
        format!(
            r"(?P<v1>\d+(?:\.\d+)?)\s*(?P<u1>{MILLION})?\s+(?:to|ل|الى|إلى)\s+(?P<v2>\d+(?:\.\d+)?)\s*(?P<u2>{MILLION})?"
        ),
        format!(
            r"(?P<v1>\d+(?:\.\d+)?)\s*(?P<u1>{MILLION})?\s*-\s*(?P<v2>\d+(?:\.\d+)?)\s*(?P<u2>{MILLION})?"
        ),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

static BUDGET_MILLIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b(\d+(?:\.\d+)?)\s*(?:{MILLION})\b")).expect("static regex"));
static BUDGET_THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*(?:k|thousand|الف)\b").expect("static regex"));
static BUDGET_RAW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?: \d{3})+|\d{6,})\b").expect("static regex"));

const BUDGET_MAX_INDICATORS: &[&str] = &[
    "up to", "not more than", "no more than", "at most", "maximum", "less than", "below",
    "under", "max", "بحد اقصى", "بحد أقصى", "حد اقصى", "حد أقصى", "اقل من", "أقل من", "تحت",
    "ماكس",
];

const BUDGET_MIN_INDICATORS: &[&str] = &[
    "starting from", "from", "at least", "minimum", "more than", "above", "over", "min",
    "ابتداء من", "ابتداءً من", "من", "حد ادنى", "حد أدنى", "على الاقل", "على الأقل", "اكتر من",
    "أكثر من",
];

fn unit_multiplier(unit: Option<&str>) -> i64 {
    match unit {
        Some(_) => 1_000_000,
        None => 1,
    }
}

/// Explicit budget range, e.g. "between 3M and 5M", "3-5 million",
/// "من ٣م ل ٥م". A unit suffix on either side is inherited by the other.
/// A range with no unit anywhere must already be in EGP scale, otherwise
/// it is more likely an area or bedroom span.
fn parse_budget_range(message: &str) -> Option<(i64, i64)> {
    let t = numeric_text(message);
    for pattern in BUDGET_RANGES.iter() {
        let Some(caps) = pattern.captures(&t) else { continue };
        let v1: f64 = caps["v1"].parse().ok()?;
        let v2: f64 = caps["v2"].parse().ok()?;
        let u1 = caps.name("u1").map(|m| m.as_str());
        let u2 = caps.name("u2").map(|m| m.as_str());
        let (u1, u2) = match (u1, u2) {
            (None, Some(u)) => (Some(u), Some(u)),
            (Some(u), None) => (Some(u), Some(u)),
            other => other,
        };
        let b1 = (v1 * unit_multiplier(u1) as f64) as i64;
        let b2 = (v2 * unit_multiplier(u2) as f64) as i64;
        if u1.is_none() && u2.is_none() && b1.min(b2) < 100_000 {
            continue;
        }
        return Some((b1.min(b2), b1.max(b2)));
    }
    None
}

/// Single budget amount in EGP: magnitude suffixes or a raw 6+-digit
/// number (grouped by spaces or not).
fn parse_budget_single(message: &str) -> Option<i64> {
    let t = numeric_text(message);
    if let Some(caps) = BUDGET_MILLIONS.captures(&t) {
        let value: f64 = caps[1].parse().ok()?;
        return Some((value * 1_000_000.0) as i64);
    }
    if let Some(caps) = BUDGET_THOUSANDS.captures(&t) {
        let value: f64 = caps[1].parse().ok()?;
        return Some((value * 1_000.0) as i64);
    }
    if let Some(caps) = BUDGET_RAW.captures(&t) {
        let digits: i64 = caps[1].replace(' ', "").parse().ok()?;
        if digits >= 100_000 {
            return Some(digits);
        }
    }
    None
}

fn contains_any(normalized: &str, indicators: &[&str]) -> bool {
    indicators.iter().any(|phrase| normalized.contains(phrase))
}

// ---------------------------------------------------------------------------
// Area
// ---------------------------------------------------------------------------

const AREA_UNIT: &str =
    r"(?:sqm|m2|m²|م2|م²|square\s+(?:meters?|metres?)|meters?|metres?|متر\s+مربع|متر)?";

static AREA_RANGES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(
            r"(?:between|بين)\s+(\d+(?:\.\d+)?)\s*{AREA_UNIT}\s+(?:and|و)\s+(\d+(?:\.\d+)?)\s*{AREA_UNIT}"
        ),
        format!(
            r"(?:from|من)\s+(\d+(?:\.\d+)?)\s*{AREA_UNIT}\s+(?:to|ل|الى|إلى)\s+(\d+(?:\.\d+)?)\s*{AREA_UNIT}"
        ),
        format!(
            r"(\d+(?:\.\d+)?)\s*{AREA_UNIT}\s+(?:to|ل|الى|إلى)\s+(\d+(?:\.\d+)?)\s*{AREA_UNIT}"
        ),
        format!(r"(\d+(?:\.\d+)?)\s*{AREA_UNIT}\s*-\s*(\d+(?:\.\d+)?)\s*{AREA_UNIT}"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

static AREA_SQM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*(?:sqm|m2|m²|م2|م²)\b").expect("static regex"));
static AREA_SQUARE_METERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+(?:\.\d+)?)\s*square\s+(?:meters?|metres?)\b").expect("static regex")
});
static AREA_ARABIC_METERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*(?:متر\s+مربع|متر)\b").expect("static regex"));

const AREA_MAX_INDICATORS: &[&str] = &[
    "up to", "not more than", "no more than", "at most", "maximum", "max", "less than", "below",
    "under", "بحد اقصى", "بحد أقصى", "حد اقصى", "حد أقصى", "اقل من", "أقل من", "تحت", "ماكس",
];

const AREA_MIN_INDICATORS: &[&str] = &[
    "starting from", "from", "at least", "minimum", "min", "more than", "above", "over",
    "ابتداء من", "ابتداءً من", "من", "حد ادنى", "حد أدنى", "على الاقل", "على الأقل", "اكتر من",
    "أكثر من",
];

/// Area range: a unit token on at least one side is required so plain
/// "3 to 5" spans never read as square meters.
fn parse_area_range(message: &str) -> Option<(f64, f64)> {
    let t = numeric_text(message);
    if !AREA_SQM.is_match(&t)
        && !AREA_SQUARE_METERS.is_match(&t)
        && !AREA_ARABIC_METERS.is_match(&t)
    {
        return None;
    }
    for pattern in AREA_RANGES.iter() {
        if let Some(caps) = pattern.captures(&t) {
            let v1: f64 = caps[1].parse().ok()?;
            let v2: f64 = caps[2].parse().ok()?;
            return Some((v1.min(v2), v1.max(v2)));
        }
    }
    None
}

fn parse_area_single(message: &str) -> Option<f64> {
    let t = numeric_text(message);
    for pattern in [&*AREA_SQM, &*AREA_SQUARE_METERS, &*AREA_ARABIC_METERS] {
        if let Some(caps) = pattern.captures(&t) {
            return caps[1].parse().ok();
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Bedrooms, floor, features, payment plan
// ---------------------------------------------------------------------------

static BEDROOM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(\d+)\s*(?:bedroom|bed|beds)\b".to_string(),
        r"\b(\d+)\s*br\b".to_string(),
        r"\b(\d+)\s*(?:غرفة|غرف)\b".to_string(),
        r"\b(\d+)\s*(?:bedroom|bed|beds)?\s+(?:apartment|apt|flat|villa|chalet|townhouse|duplex|penthouse|studio|unit|شقة|شقه|فيلا|شاليه|تاون|دوبلكس|استوديو|بنتهاوس)\b"
            .to_string(),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

fn parse_bedrooms(message: &str) -> Option<u8> {
    let t = text::to_latin_digits(&message.to_lowercase());
    for pattern in BEDROOM_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&t) {
            return caps[1].parse().ok();
        }
    }
    None
}

static FLOOR_PATTERNS: Lazy<Vec<(FloorType, Regex)>> = Lazy::new(|| {
    [
        (FloorType::GroundFloor, r"\bground\s+floor\b|أرضي|ارضي"),
        (FloorType::FirstFloor, r"\bfirst\s+floor\b|\b1st\s+floor\b|أول|اول"),
        (FloorType::SecondFloor, r"\bsecond\s+floor\b|\b2nd\s+floor\b|ثاني|تاني"),
        (FloorType::HighFloor, r"\bhigh\s+floor\b|دور عالي"),
        (FloorType::LowFloor, r"\blow\s+floor\b|دور واطي|دور منخفض"),
        (FloorType::MiddleFloor, r"\bmiddle\s+floor\b|دور متوسط"),
        (FloorType::TopFloor, r"\btop\s+floor\b|\bupper\s+floor\b|آخر دور|اخر دور"),
    ]
    .iter()
    .map(|(floor, p)| (*floor, Regex::new(p).expect("static regex")))
    .collect()
});

fn parse_floor_type(normalized: &str) -> Option<FloorType> {
    FLOOR_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(normalized))
        .map(|(floor, _)| *floor)
}

struct FeaturePatterns {
    garden: Regex,
    roof: Regex,
    terrace: Regex,
    balcony: Regex,
    sea_view: Regex,
    garden_view: Regex,
    pool_view: Regex,
    unfurnished: Regex,
    semi_furnished: Regex,
    furnished: Regex,
    spacious: Regex,
    compact: Regex,
}

static FEATURES: Lazy<FeaturePatterns> = Lazy::new(|| FeaturePatterns {
    garden: Regex::new(r"\bwith\s+garden\b|\bgarden\s+unit\b|\bgarden\s+villa\b|بحديقة|حديقة")
        .expect("static regex"),
    roof: Regex::new(r"\bwith\s+roof\b|\broof\s+terrace\b|\brooftop\b|روف").expect("static regex"),
    terrace: Regex::new(r"\bwith\s+terrace\b|\bterrace\b|تراس").expect("static regex"),
    balcony: Regex::new(r"\bwith\s+balcony\b|\bbalcony\b|بلكونة|بلكون").expect("static regex"),
    sea_view: Regex::new(r"\bsea\s+view\b|\bocean\s+view\b|\bbeach\s+view\b|إطلالة بحر|اطلالة بحر|بحر")
        .expect("static regex"),
    garden_view: Regex::new(r"\bgarden\s+view\b|\bgreen\s+view\b|إطلالة حديقة|اطلالة حديقة|حديقة")
        .expect("static regex"),
    pool_view: Regex::new(r"\bpool\s+view\b|حمام سباحة|بيسين").expect("static regex"),
    unfurnished: Regex::new(r"\bunfurnished\b|\bnot\s+furnished\b|غير مفروش").expect("static regex"),
    semi_furnished: Regex::new(r"\bsemi[-\s]?furnished\b|\bpartly\s+furnished\b|نصف مفروش|نص مفروش")
        .expect("static regex"),
    furnished: Regex::new(r"\bfurnished\b|مفروش").expect("static regex"),
    spacious: Regex::new(r"\bspacious\b|\bbig\b|\blarge\b|\broomy\b|واسعة|واسع|كبيرة|كبير")
        .expect("static regex"),
    compact: Regex::new(r"\bcompact\b|\bsmall\b|\bcozy\b|صغيرة|صغير").expect("static regex"),
});

fn parse_features(normalized: &str) -> Features {
    let p = &*FEATURES;
    let mut features = Features::default();
    features.has_garden = p.garden.is_match(normalized);
    features.has_roof = p.roof.is_match(normalized);
    features.has_terrace = p.terrace.is_match(normalized);
    features.has_balcony = p.balcony.is_match(normalized);

    features.view = if p.sea_view.is_match(normalized) {
        Some(ViewType::Sea)
    } else if p.garden_view.is_match(normalized) {
        Some(ViewType::Garden)
    } else if p.pool_view.is_match(normalized) {
        Some(ViewType::Pool)
    } else {
        None
    };

    features.furnishing = if p.unfurnished.is_match(normalized) {
        Some(Furnishing::Unfurnished)
    } else if p.semi_furnished.is_match(normalized) {
        Some(Furnishing::Semi)
    } else if p.furnished.is_match(normalized) {
        Some(Furnishing::Furnished)
    } else {
        None
    };

    features.size_preference = if p.spacious.is_match(normalized) {
        Some(SizePreference::Spacious)
    } else if p.compact.is_match(normalized) {
        Some(SizePreference::Compact)
    } else {
        None
    };

    features
}

fn parse_payment_plan(normalized: &str) -> Option<PaymentPlan> {
    let cash = normalized.contains("cash") || normalized.contains("كاش");
    let installments = normalized.contains("installment")
        || normalized.contains("تقسيط")
        || normalized.contains("اقساط")
        || normalized.contains("أقساط");
    match (cash, installments) {
        (true, true) => Some(PaymentPlan::Either),
        (true, false) => Some(PaymentPlan::Cash),
        (false, true) => Some(PaymentPlan::Installments),
        (false, false) if normalized.contains("مش فارقة") => Some(PaymentPlan::Either),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

static LOCATION_OVERRIDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:change|set)\s+(?:the\s+)?location\s+(?:to|as)\s+(.+)$").expect("static regex")
});

static PREFERENCE_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:or|but|preferably|prefer|mainly|mostly|ideally|if possible|او|لكن|يفضل|ممكن)\s+")
        .expect("static regex")
});

static DIRECTIONAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:in|at|near|close to|by|next to|beside|around)\s+(.+)$",
        r"\b(?:located in|situated in|based in)\s+(.+)$",
        r"(?:في|بـ|ب|جنب|قريب من|حول)\s+(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Resolves the user's location, in order: explicit "change location to X"
/// override (which accepts values outside the gazetteer), segments split on
/// preference connectors, directional phrases, then the whole message.
fn parse_location(message: &str) -> Option<String> {
    let normalized = text::normalize(message);
    if normalized.is_empty() {
        return None;
    }

    if let Some(caps) = LOCATION_OVERRIDE.captures(&normalized) {
        let candidate = caps[1].trim();
        let resolved = lexicon::lookup_location(candidate).unwrap_or(candidate);
        return Some(text::title_case_location(resolved));
    }

    for segment in PREFERENCE_SPLIT.split(&normalized) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some(found) = lexicon::lookup_location(segment) {
            return Some(text::title_case_location(found));
        }
    }

    for pattern in DIRECTIONAL.iter() {
        if let Some(caps) = pattern.captures(&normalized) {
            let candidate = caps[1].trim();
            let found =
                lexicon::lookup_location(candidate).or_else(|| lexicon::lookup_location(&normalized));
            if let Some(found) = found {
                return Some(text::title_case_location(found));
            }
        }
    }

    lexicon::lookup_location(&normalized).map(text::title_case_location)
}

fn parse_unit_type(message: &str) -> Option<UnitType> {
    lexicon::lookup_unit_type(&text::normalize(message))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Extracts every preference the message carries. Range matches win over
/// single-value indicator parsing; a lone budget amount defaults to a
/// maximum and a lone area to a minimum.
pub fn extract(message: &str) -> StatePatch {
    let normalized = text::normalize(message);
    let mut patch = StatePatch::default();

    if let Some(location) = parse_location(message) {
        patch.location = Field::Set(location);
    }
    if let Some(unit) = parse_unit_type(message) {
        patch.unit_type = Field::Set(unit);
    }

    if let Some((min, max)) = parse_budget_range(message) {
        patch.budget_min = Field::Set(min);
        patch.budget_max = Field::Set(max);
    } else if let Some(amount) = parse_budget_single(message) {
        if contains_any(&normalized, BUDGET_MAX_INDICATORS) {
            patch.budget_max = Field::Set(amount);
        } else if contains_any(&normalized, BUDGET_MIN_INDICATORS) {
            patch.budget_min = Field::Set(amount);
        } else {
            // "I want something for 5M" is a ceiling, not a target.
            patch.budget_max = Field::Set(amount);
        }
    }

    if let Some((min, max)) = parse_area_range(message) {
        patch.area_min = Field::Set(min);
        patch.area_max = Field::Set(max);
    } else if let Some(area) = parse_area_single(message) {
        if contains_any(&normalized, AREA_MAX_INDICATORS) {
            patch.area_max = Field::Set(area);
        } else if contains_any(&normalized, AREA_MIN_INDICATORS) {
            patch.area_min = Field::Set(area);
        } else {
            patch.area_min = Field::Set(area);
        }
    }

    if let Some(bedrooms) = parse_bedrooms(message) {
        patch.bedrooms = Field::Set(bedrooms);
    }
    if let Some(floor) = parse_floor_type(&normalized) {
        patch.floor_type = Field::Set(floor);
    }
    let features = parse_features(&normalized);
    if !features.is_empty() {
        patch.features = Field::Set(features);
    }
    if let Some(plan) = parse_payment_plan(&normalized) {
        patch.payment_plan = Field::Set(plan);
    }

    patch
}
