//! Back-reference resolution: mapping "option 2", "the second one" or
//! "project 22" onto the result list shown in an earlier turn.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexicon;
use crate::state::Listing;
use crate::text;

static PROJECT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:project\s*id|project|id)\s*[:#]?\s*(\d+)\b").expect("static regex")
});
static OPTION_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:option|choose|pick|select|show)\s*#?\s*(\d+)\b").expect("static regex")
});
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?\s*(\d+)\s*$").expect("static regex"));

/// Explicit project-id phrasing ("project 22", "id 22"), if any.
pub fn extract_project_id(message: &str) -> Option<i64> {
    let t = text::normalize(message);
    PROJECT_ID.captures(&t).and_then(|caps| caps[1].parse().ok())
}

/// Option reference as a 0-based index: ordinal words, "option/choose/
/// pick/select/show <n>" phrasing, or a standalone number.
pub fn extract_option_index(message: &str) -> Option<usize> {
    let t = text::normalize(message);

    if let Some(one_based) = lexicon::lookup_ordinal(&t) {
        return one_based.checked_sub(1);
    }

    let caps = OPTION_INDEX.captures(&t).or_else(|| BARE_NUMBER.captures(&t))?;
    let n: usize = caps[1].parse().ok()?;
    n.checked_sub(1)
}

/// Outcome of resolving a selection against the last shown results.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Matched a shown listing; index is 0-based into the shown list.
    Chosen { listing: Listing, index: usize },
    /// An explicit project id was named but is not in the shown list.
    UnknownProjectId(i64),
    /// An option index was given but falls outside 1..=len.
    OutOfRange { given: usize, available: usize },
    /// Nothing in the message reads as a selection.
    NotASelection,
}

/// Resolves a selection message, in order: explicit project id, option
/// index or ordinal, then a bare number read first as a 1-based index and
/// failing that as a literal project id.
pub fn resolve_choice(message: &str, last_results: &[Listing]) -> Resolution {
    let t = text::normalize(message);

    if let Some(pid) = extract_project_id(&t) {
        return match last_results.iter().position(|r| r.project_id == pid) {
            Some(index) => Resolution::Chosen { listing: last_results[index].clone(), index },
            None => Resolution::UnknownProjectId(pid),
        };
    }

    if let Some(index) = extract_option_index(&t) {
        if index < last_results.len() {
            return Resolution::Chosen { listing: last_results[index].clone(), index };
        }
        if let Some(caps) = BARE_NUMBER.captures(&t) {
            // A lone out-of-range number may be a project id instead.
            if let Ok(n) = caps[1].parse::<i64>() {
                if let Some(found) = last_results.iter().position(|r| r.project_id == n) {
                    return Resolution::Chosen {
                        listing: last_results[found].clone(),
                        index: found,
                    };
                }
            }
        }
        return Resolution::OutOfRange { given: index + 1, available: last_results.len() };
    }

    Resolution::NotASelection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(n: i64) -> Vec<Listing> {
        (1..=n)
            .map(|i| Listing {
                project_id: i * 10,
                project_name: format!("Project {i}"),
                location: None,
                unit_type: None,
                area: Some(100.0 + i as f64),
                price: Some(1_000_000 * i),
            })
            .collect()
    }

    #[test]
    fn explicit_project_id_wins_over_index_reading() {
        let shown = results(5);
        let resolved = resolve_choice("project 30", &shown);
        assert_eq!(
            resolved,
            Resolution::Chosen { listing: shown[2].clone(), index: 2 },
        );
    }

    #[test]
    fn unknown_project_id_is_reported_as_such() {
        assert_eq!(resolve_choice("project 999", &results(3)), Resolution::UnknownProjectId(999));
    }

    #[test]
    fn ordinals_resolve_to_indexes() {
        let shown = results(5);
        assert_eq!(
            resolve_choice("the second one", &shown),
            Resolution::Chosen { listing: shown[1].clone(), index: 1 },
        );
        assert_eq!(
            resolve_choice("التالت", &shown),
            Resolution::Chosen { listing: shown[2].clone(), index: 2 },
        );
    }

    #[test]
    fn bare_number_in_range_is_an_index() {
        let shown = results(5);
        assert_eq!(
            resolve_choice("2", &shown),
            Resolution::Chosen { listing: shown[1].clone(), index: 1 },
        );
        assert_eq!(
            resolve_choice("#4", &shown),
            Resolution::Chosen { listing: shown[3].clone(), index: 3 },
        );
    }

    #[test]
    fn bare_number_out_of_range_falls_back_to_project_id() {
        let shown = results(5);
        // 40 is out of range as an index but is a shown project id.
        assert_eq!(
            resolve_choice("40", &shown),
            Resolution::Chosen { listing: shown[3].clone(), index: 3 },
        );
    }

    #[test]
    fn out_of_range_option_reports_the_valid_span() {
        assert_eq!(
            resolve_choice("option 6", &results(5)),
            Resolution::OutOfRange { given: 6, available: 5 },
        );
    }

    #[test]
    fn non_selection_text_is_not_a_selection() {
        assert_eq!(resolve_choice("somewhere sunny", &results(3)), Resolution::NotASelection);
    }
}
