//! Refinement turns: reset, explicit budget/location changes, and the
//! relative adjustments ("cheaper", "bigger") that move bounds by a step.
//!
//! Every branch is a pure function from (message, current state) to a
//! patch, so the orchestrator can apply it atomically.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexicon;
use crate::state::{ConversationState, Field, StatePatch};
use crate::text;

/// Budget step: ten percent, but never less than 250k EGP so small budgets
/// still move noticeably.
const BUDGET_STEP_FLOOR: i64 = 250_000;
/// Area grows by ten percent with a 10 sqm floor; with no prior minimum a
/// "bigger" request starts from 100 sqm.
const AREA_STEP_FLOOR: f64 = 10.0;
const AREA_DEFAULT_MIN: f64 = 100.0;
/// Shrinking below this clears the minimum instead of keeping a
/// meaningless filter.
const AREA_LOWER_LIMIT: f64 = 30.0;

const RESET_TRIGGERS: &[&str] = &["reset", "restart", "start over", "new search", "from scratch"];

static LOCATION_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:change|set)\s+(?:the\s+)?location\s+(?:to|as)\s+(.+)$").expect("static regex")
});

static NUMBER_EGP_MILLIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*(?:million|m)\b").expect("static regex"));
static NUMBER_EGP_RAW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?: \d{3})+|\d{6,})\b").expect("static regex"));

const BUDGET_CONTEXT: &[&str] =
    &["budget", "max", "under", "less than", "up to", "increase", "raise", "set", "to"];
const BUDGET_CONFIRMERS: &[&str] = &["budget", "max", "under", "up to", "egp", "million", "m"];

const CHEAPER_TRIGGERS: &[&str] = &["cheaper", "lower", "decrease budget", "reduce budget"];
const PRICIER_TRIGGERS: &[&str] =
    &["more expensive", "increase budget", "raise budget", "higher budget"];
const BIGGER_TRIGGERS: &[&str] = &["bigger", "larger", "more space", "bigger area"];
const SMALLER_TRIGGERS: &[&str] = &["smaller", "less space", "smaller area"];

/// What a refinement turn did, so the orchestrator can phrase the reply.
#[derive(Clone, Debug, PartialEq)]
pub enum Refinement {
    /// Full reset: every slot cleared, result memory dropped.
    Reset(StatePatch),
    /// A concrete adjustment; the patch also drops any prior confirmation.
    Adjusted(StatePatch),
    /// The message asked for a relative change with no bound to move, or
    /// did not read as a refinement at all.
    NoChange,
}

fn contains_any(t: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| t.contains(p))
}

fn parse_number_egp(t: &str) -> Option<i64> {
    let cleaned = t.replace(',', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(caps) = NUMBER_EGP_MILLIONS.captures(&cleaned) {
        let value: f64 = caps[1].parse().ok()?;
        return Some((value * 1_000_000.0) as i64);
    }
    if let Some(caps) = NUMBER_EGP_RAW.captures(&cleaned) {
        let n: i64 = caps[1].replace(' ', "").parse().ok()?;
        if n >= 100_000 {
            return Some(n);
        }
    }
    None
}

fn reset_patch() -> StatePatch {
    StatePatch {
        location: Field::Clear,
        budget_min: Field::Clear,
        budget_max: Field::Clear,
        area_min: Field::Clear,
        area_max: Field::Clear,
        unit_type: Field::Clear,
        bedrooms: Field::Clear,
        floor_type: Field::Clear,
        features: Field::Clear,
        payment_plan: Field::Clear,
        confirmed: Field::Clear,
        chosen_option: Field::Clear,
        last_results: Field::Clear,
        last_project_ids: Field::Clear,
    }
}

fn adjusted(patch: StatePatch) -> Refinement {
    Refinement::Adjusted(StatePatch {
        confirmed: Field::Clear,
        chosen_option: Field::Clear,
        ..patch
    })
}

fn budget_step(budget: i64) -> i64 {
    ((budget as f64 * 0.10) as i64).max(BUDGET_STEP_FLOOR)
}

/// Builds the patch for a refinement turn against the current state.
pub fn build_refine_patch(message: &str, state: &ConversationState) -> Refinement {
    let t = text::normalize(message);

    if contains_any(&t, RESET_TRIGGERS) {
        return Refinement::Reset(reset_patch());
    }

    if let Some(caps) = LOCATION_CHANGE.captures(&t) {
        let candidate = caps[1].trim();
        let resolved = lexicon::lookup_location(candidate).unwrap_or(candidate);
        return adjusted(StatePatch {
            location: Field::Set(text::title_case_location(resolved)),
            ..Default::default()
        });
    }

    if contains_any(&t, BUDGET_CONTEXT) {
        if let Some(amount) = parse_number_egp(&t) {
            if contains_any(&t, BUDGET_CONFIRMERS) || amount >= 500_000 {
                return adjusted(StatePatch {
                    budget_max: Field::Set(amount),
                    ..Default::default()
                });
            }
        }
    }

    if contains_any(&t, CHEAPER_TRIGGERS) {
        return match state.budget_max {
            Some(budget) if budget > 0 => adjusted(StatePatch {
                budget_max: Field::Set((budget - budget_step(budget)).max(0)),
                ..Default::default()
            }),
            _ => Refinement::NoChange,
        };
    }

    if contains_any(&t, PRICIER_TRIGGERS) {
        return match state.budget_max {
            Some(budget) if budget > 0 => adjusted(StatePatch {
                budget_max: Field::Set(budget + budget_step(budget)),
                ..Default::default()
            }),
            _ => Refinement::NoChange,
        };
    }

    if contains_any(&t, BIGGER_TRIGGERS) {
        let new_min = match state.area_min {
            Some(area) if area > 0.0 => area + (area * 0.10).max(AREA_STEP_FLOOR),
            _ => AREA_DEFAULT_MIN,
        };
        return adjusted(StatePatch { area_min: Field::Set(new_min), ..Default::default() });
    }

    if contains_any(&t, SMALLER_TRIGGERS) {
        return match state.area_min {
            Some(area) if area > 0.0 => {
                let new_min = area - 10.0;
                let field =
                    if new_min >= AREA_LOWER_LIMIT { Field::Set(new_min) } else { Field::Clear };
                adjusted(StatePatch { area_min: field, ..Default::default() })
            }
            _ => Refinement::NoChange,
        };
    }

    Refinement::NoChange
}
