//! Pairwise project comparison: summaries, difference sentences, and the
//! parsing helpers that turn "compare 1 and 2" or "A vs B" into targets.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::ProjectProfile;

pub const MAX_COMPARE_TARGETS: usize = 4;

/// Per-project rollup used in comparison replies.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub unit_types_count: usize,
}

impl ProjectSummary {
    pub fn of(project: &ProjectProfile) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            location: project.location.clone(),
            min_price: project.min_price(),
            max_price: project.max_price(),
            min_area: project.min_area(),
            max_area: project.max_area(),
            unit_types_count: project.units.len(),
        }
    }
}

/// Difference sentences; "not enough data" when fewer than two projects
/// carry the relevant figure.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub summaries: Vec<ProjectSummary>,
    pub price: String,
    pub unit_sizes: String,
    pub variety: String,
}

/// Compares two or more loaded projects.
pub fn compare_projects(projects: &[ProjectProfile]) -> Comparison {
    let summaries: Vec<ProjectSummary> = projects.iter().map(ProjectSummary::of).collect();

    let priced: Vec<&ProjectSummary> =
        summaries.iter().filter(|s| s.min_price.is_some()).collect();
    let price = if priced.len() >= 2 {
        let cheapest = priced.iter().min_by_key(|s| s.min_price).unwrap();
        let priciest = priced.iter().max_by_key(|s| s.min_price).unwrap();
        format!(
            "{} starts cheaper, while {} has a higher entry price.",
            cheapest.name, priciest.name
        )
    } else {
        "Not enough pricing data to compare entry prices.".to_string()
    };

    let sized: Vec<&ProjectSummary> = summaries.iter().filter(|s| s.max_area.is_some()).collect();
    let unit_sizes = if sized.len() >= 2 {
        let largest = sized
            .iter()
            .max_by(|a, b| a.max_area.partial_cmp(&b.max_area).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap();
        let smallest = sized
            .iter()
            .min_by(|a, b| a.max_area.partial_cmp(&b.max_area).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap();
        format!("{} offers larger max unit sizes than {}.", largest.name, smallest.name)
    } else {
        "Not enough area data to compare unit sizes.".to_string()
    };

    let variety = if summaries.len() >= 2 {
        let most = summaries.iter().max_by_key(|s| s.unit_types_count).unwrap();
        let least = summaries.iter().min_by_key(|s| s.unit_types_count).unwrap();
        format!("{} lists more unit options than {}.", most.name, least.name)
    } else {
        String::new()
    };

    Comparison { summaries, price, unit_sizes, variety }
}

static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("static regex"));
static VS_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:vs|versus)\b").expect("static regex"));
static COMPARE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:compare|difference between)\s+(.*)$").expect("static regex"));
static AND_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\band\b|&").expect("static regex"));
static COMPARE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*compare\s+").expect("static regex"));

/// All numeric tokens in the message, capped at the compare limit.
pub fn extract_numbers(message: &str) -> Vec<i64> {
    NUMBER_TOKEN
        .captures_iter(message)
        .filter_map(|caps| caps[1].parse().ok())
        .take(MAX_COMPARE_TARGETS)
        .collect()
}

/// Remaps numeric tokens to remembered project ids when the phrasing reads
/// as an option comparison and every number fits 1..=len(remembered).
pub fn map_option_indexes(message: &str, numbers: &[i64], remembered: &[i64]) -> Vec<i64> {
    if remembered.is_empty() || numbers.len() < 2 {
        return numbers.to_vec();
    }
    let t = message.to_lowercase();
    let option_phrasing = t.contains("compare")
        || t.contains("between")
        || t.contains(" vs ")
        || t.contains("versus");
    let capped = &numbers[..numbers.len().min(MAX_COMPARE_TARGETS)];
    if option_phrasing && capped.iter().all(|&n| n >= 1 && (n as usize) <= remembered.len()) {
        return capped.iter().map(|&n| remembered[n as usize - 1]).collect();
    }
    numbers.to_vec()
}

/// Splits "Compare A vs B" / "difference between A and B" into candidate
/// project names for fuzzy lookup.
pub fn split_compare_names(message: &str) -> Vec<String> {
    let t = message.trim();

    if VS_SPLIT.is_match(t) {
        let mut parts: Vec<String> = VS_SPLIT
            .split(t)
            .map(|p| p.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == ',').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if let Some(first) = parts.first_mut() {
            *first = COMPARE_WORD.replace(first, "").trim().to_string();
        }
        parts.retain(|p| !p.is_empty());
        return parts;
    }

    if let Some(caps) = COMPARE_PREFIX.captures(t) {
        return AND_SPLIT
            .split(&caps[1])
            .map(|p| p.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == ',').to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitOffering;

    fn project(id: i64, name: &str, prices: &[i64], areas: &[f64]) -> ProjectProfile {
        let units = prices
            .iter()
            .zip(areas.iter())
            .map(|(&price, &area)| UnitOffering {
                unit_type: "Apartment".to_string(),
                area: Some(area),
                price: Some(price),
                bedrooms: None,
            })
            .collect();
        ProjectProfile { id, name: name.to_string(), location: None, developer: None, units }
    }

    #[test]
    fn differences_name_the_extremes() {
        let a = project(1, "Badya", &[2_500_000, 4_000_000], &[90.0, 160.0]);
        let b = project(2, "Marassi", &[8_000_000, 12_000_000], &[120.0, 300.0]);
        let cmp = compare_projects(&[a, b]);
        assert!(cmp.price.starts_with("Badya starts cheaper"));
        assert!(cmp.unit_sizes.starts_with("Marassi offers larger"));
        assert_eq!(cmp.summaries.len(), 2);
    }

    #[test]
    fn missing_figures_report_not_enough_data() {
        let a = project(1, "Badya", &[2_500_000], &[90.0]);
        let b = ProjectProfile {
            id: 2,
            name: "Bare".to_string(),
            location: None,
            developer: None,
            units: vec![UnitOffering {
                unit_type: "Villa".to_string(),
                area: None,
                price: None,
                bedrooms: None,
            }],
        };
        let cmp = compare_projects(&[a, b]);
        assert_eq!(cmp.price, "Not enough pricing data to compare entry prices.");
        assert_eq!(cmp.unit_sizes, "Not enough area data to compare unit sizes.");
    }

    #[test]
    fn numbers_are_capped_at_four() {
        assert_eq!(extract_numbers("compare 1 2 3 4 5"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn option_indexes_remap_to_remembered_ids() {
        let remembered = vec![70, 81, 92];
        assert_eq!(map_option_indexes("compare 1 and 2", &[1, 2], &remembered), vec![70, 81]);
        // Out-of-range numbers stay literal ids.
        assert_eq!(map_option_indexes("compare 70 and 81", &[70, 81], &remembered), vec![70, 81]);
        // Without compare phrasing, numbers stay literal.
        assert_eq!(map_option_indexes("1 and 2 details", &[1, 2], &remembered), vec![1, 2]);
    }

    #[test]
    fn name_splitting_handles_vs_and_between() {
        assert_eq!(split_compare_names("Compare Bloomfields vs Village West"), vec![
            "Bloomfields".to_string(),
            "Village West".to_string(),
        ]);
        assert_eq!(split_compare_names("difference between Badya and Taj City"), vec![
            "Badya".to_string(),
            "Taj City".to_string(),
        ]);
        assert!(split_compare_names("show me options").is_empty());
    }
}
