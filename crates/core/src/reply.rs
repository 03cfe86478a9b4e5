//! Every user-facing reply string. Plain templates, no generation: the
//! orchestrator picks the branch, this module words it.

use crate::catalog::{ProjectProfile, UnitOffering};
use crate::compare::Comparison;
use crate::intent::UnitSuperlative;
use crate::state::Listing;

/// Slots the dialogue can ask about, in the order they are asked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Location,
    BudgetMax,
    UnitType,
    Bedrooms,
    PaymentPlan,
}

pub fn slot_question(slot: Slot) -> &'static str {
    match slot {
        Slot::Location => "Which location do you prefer (e.g., New Cairo, Zayed, North Coast)?",
        Slot::BudgetMax => "What is your maximum budget in EGP?",
        Slot::UnitType => "Which unit type do you prefer (Apartment, Villa, Townhouse, Chalet)?",
        Slot::Bedrooms => "How many bedrooms do you need?",
        Slot::PaymentPlan => "Do you prefer cash or installments?",
    }
}

pub fn nothing_to_search() -> &'static str {
    "What would you like to search for?"
}

/// Reset acknowledgement; the dialogue restarts at the first slot.
pub fn restarted() -> String {
    format!("Done, starting fresh.\n{}", slot_question(Slot::Location))
}

pub fn search_failed() -> &'static str {
    "Something went wrong while searching. Please try again or change your filters."
}

fn thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn money(price: Option<i64>) -> String {
    match price {
        Some(p) => format!("{} EGP", thousands(p)),
        None => "N/A EGP".to_string(),
    }
}

fn sqm(area: Option<f64>) -> String {
    match area {
        Some(a) => format!("{:.0} m²", a),
        None => "N/A m²".to_string(),
    }
}

/// Numbered result list shown after a search.
pub fn results_list(results: &[Listing]) -> String {
    if results.is_empty() {
        return no_matches(None);
    }
    let mut lines = vec!["Here are the best matches I found:".to_string()];
    for (i, r) in results.iter().enumerate() {
        lines.push(format!(
            "{}) {} ({}) — {} — {} — {}",
            i + 1,
            r.project_name,
            r.location.as_deref().unwrap_or("Unknown Location"),
            r.unit_type.as_deref().unwrap_or("Unknown Unit"),
            sqm(r.area),
            money(r.price),
        ));
    }
    lines.join("\n")
}

/// Empty-result reply, with the cheapest-available hint when the catalog
/// could price the current location/unit filters.
pub fn no_matches(min_price_hint: Option<(i64, &str, &str)>) -> String {
    match min_price_hint {
        Some((min_price, location, unit_type)) => format!(
            "I couldn’t find matches with these filters.\nLowest available in {} for {} is about {} EGP.\nDo you want to increase your budget, or change area/unit type?",
            location,
            unit_type,
            thousands(min_price),
        ),
        None => "I couldn’t find matches with the current filters. Want to relax the budget or change the location/unit type?"
            .to_string(),
    }
}

/// Detail card for a confirmed option (1-based index).
pub fn selected_option(listing: &Listing, index_1_based: usize) -> String {
    format!(
        "Option {} details:\n- Project: {}\n- Location: {}\n- Unit type: {}\n- Area: {} m²\n- Price: {}\n\nIf you want, I can arrange a viewing — just tell me when suits you.",
        index_1_based,
        listing.project_name,
        listing.location.as_deref().unwrap_or("N/A"),
        listing.unit_type.as_deref().unwrap_or("N/A"),
        listing.area.map(|a| format!("{a:.0}")).unwrap_or_else(|| "N/A".to_string()),
        money(listing.price),
    )
}

/// Confirmation follow-up ("yes", "book it") once an option is chosen.
pub fn visit_confirmed(listing: &Listing) -> String {
    format!(
        "Great — I’ll arrange a viewing for {} in {}. The sales team will contact you to confirm the time.",
        listing.project_name,
        listing.location.as_deref().unwrap_or("the selected location"),
    )
}

pub fn option_out_of_range(given: usize, available: usize) -> String {
    format!("I couldn’t find option {given}. Please choose between 1 and {available}.")
}

pub fn unknown_project(project_id: i64) -> String {
    format!("I couldn’t find project {project_id}. Please send a valid project ID or name.")
}

// Compare replies.

pub fn compare_needs_targets() -> &'static str {
    "Tell me the two project names (or pick from the last results). Example: 'Compare Bloomfields vs Village West' or 'Compare 1 and 2'."
}

pub fn compare_unresolved() -> &'static str {
    "I couldn’t resolve two projects. Try: 'Compare <project A> vs <project B>' or 'Compare 1 and 2' from the last results."
}

pub fn compare_not_enough_found() -> &'static str {
    "I couldn't find enough projects to compare from what you provided."
}

pub fn compare_summary(comparison: &Comparison) -> String {
    let names: Vec<&str> = comparison.summaries.iter().map(|s| s.name.as_str()).collect();
    let mut out = format!(
        "Comparison of: {}. Key differences focus on price, unit sizes, and unit variety based on available data.",
        names.join(", "),
    );
    let mut bullets = Vec::new();
    if !comparison.price.is_empty() {
        bullets.push(format!("- Price: {}", comparison.price));
    }
    if !comparison.unit_sizes.is_empty() {
        bullets.push(format!("- Unit sizes: {}", comparison.unit_sizes));
    }
    if !comparison.variety.is_empty() {
        bullets.push(format!("- Variety: {}", comparison.variety));
    }
    if !bullets.is_empty() {
        out.push_str("\n\n");
        out.push_str(&bullets.join("\n"));
    }
    out
}

// Per-project superlative replies.

pub fn superlative_needs_project() -> &'static str {
    "Which project? Send the project name (or ID) first, then ask “cheapest” or “largest unit”."
}

pub fn superlative_no_unit_data(project_name: &str) -> String {
    format!("I found {project_name} but there isn’t enough unit data to answer that yet.")
}

pub fn superlative_answer(
    project_name: &str,
    superlative: UnitSuperlative,
    unit: &UnitOffering,
) -> String {
    let label = match superlative {
        UnitSuperlative::LargestUnit => "largest",
        UnitSuperlative::CheapestUnit => "cheapest",
    };
    format!(
        "{}: {} option is **{}**\n- Size: {} m²\n- Price: {}",
        project_name,
        label,
        unit.unit_type,
        unit.area.map(|a| format!("{a:.0}")).unwrap_or_else(|| "N/A".to_string()),
        money(unit.price),
    )
}

// Project detail replies.

pub fn details_needs_project() -> &'static str {
    "Tell me the project name (or ID) and I’ll show details."
}

pub fn disambiguate_projects(candidates: &[ProjectProfile]) -> String {
    let mut lines = vec!["I found multiple matching projects. Which one do you mean?\n".to_string()];
    for p in candidates.iter().take(6) {
        let location = p
            .location
            .as_deref()
            .map(|l| format!(" — {l}"))
            .unwrap_or_default();
        lines.push(format!("- {}{} (id: {})", p.name, location, p.id));
    }
    lines.join("\n")
}

pub fn project_details(project: &ProjectProfile) -> String {
    let location = project.location.as_deref().unwrap_or("Unknown location");
    let mut parts = vec![format!("{} — {}", project.name, location)];

    let mut bits = Vec::new();
    if let Some(min_p) = project.min_price() {
        match project.max_price() {
            Some(max_p) if max_p != min_p => {
                bits.push(format!("Price range: {} – {} EGP", thousands(min_p), thousands(max_p)));
            }
            _ => bits.push(format!("From {} EGP", thousands(min_p))),
        }
    }
    if let Some(min_a) = project.min_area() {
        match project.max_area() {
            Some(max_a) if max_a != min_a => {
                bits.push(format!("Sizes: {:.0} – {:.0} m²", min_a, max_a));
            }
            _ => bits.push(format!("Size: {:.0} m²", min_a)),
        }
    }
    bits.push(format!("Unit options: {}", project.units.len()));
    parts.push(bits.join(" | "));
    parts.join("\n")
}

// Discovery (free-text similarity search) replies.

pub fn discover_clarification() -> &'static str {
    "Tell me what you’re looking for, for example:\n- Unit type (apartment / chalet / villa / townhouse)\n- Location (New Cairo / Sheikh Zayed / North Coast / etc.)\n- Budget (e.g., under 10 million)\n- Area (e.g., 160 sqm)\n\nExample: 'Chalet 160 sqm under 20 million in North Coast'"
}

pub fn discover_no_matches() -> &'static str {
    "I couldn't find matching unit-type options with the current filters.\nTry relaxing the area/budget or changing the location keywords."
}

/// Grouped discovery answer: top projects by best similarity, a handful
/// of options each.
pub fn discover_answer(
    groups: &[crate::catalog::DiscoveryGroup],
    max_projects: usize,
    max_options_per_project: usize,
) -> String {
    if groups.is_empty() {
        return discover_no_matches().to_string();
    }
    let mut lines = vec!["Top matches (grouped by project):".to_string(), String::new()];
    for group in groups.iter().take(max_projects) {
        lines.push(format!("- {}", group.project_name));
        for unit in group.units.iter().take(max_options_per_project) {
            lines.push(format!(
                "  • {} — {} — {} — {}",
                unit.unit_type.as_deref().unwrap_or("Unit"),
                sqm(unit.area),
                money(unit.price),
                group.location.as_deref().unwrap_or(""),
            ));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitOffering;

    fn listing() -> Listing {
        Listing {
            project_id: 12,
            project_name: "Taj City".to_string(),
            location: Some("New Cairo".to_string()),
            unit_type: Some("Apartment".to_string()),
            area: Some(140.0),
            price: Some(5_828_966),
        }
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(thousands(5_828_966), "5,828,966");
        assert_eq!(thousands(950), "950");
        assert_eq!(thousands(1_000), "1,000");
    }

    #[test]
    fn results_are_numbered_from_one() {
        let text = results_list(&[listing()]);
        assert!(text.starts_with("Here are the best matches I found:"));
        assert!(text.contains("1) Taj City (New Cairo) — Apartment — 140 m² — 5,828,966 EGP"));
    }

    #[test]
    fn empty_results_suggest_relaxing() {
        assert!(results_list(&[]).contains("relax the budget"));
    }

    #[test]
    fn min_price_hint_names_the_filters() {
        let text = no_matches(Some((3_200_000, "New Cairo", "Villa")));
        assert!(text.contains("Lowest available in New Cairo for Villa is about 3,200,000 EGP."));
    }

    #[test]
    fn selection_card_uses_one_based_index() {
        let text = selected_option(&listing(), 2);
        assert!(text.starts_with("Option 2 details:"));
        assert!(text.contains("- Price: 5,828,966 EGP"));
    }

    #[test]
    fn discover_answer_groups_by_project() {
        use crate::catalog::{DiscoveryGroup, ScoredUnit};
        let groups = vec![DiscoveryGroup {
            project_id: 3,
            project_name: "Marassi".to_string(),
            location: Some("North Coast".to_string()),
            units: vec![
                ScoredUnit {
                    unit_type: Some("Chalet".to_string()),
                    area: Some(160.0),
                    price: Some(18_500_000),
                    similarity: 0.91,
                },
                ScoredUnit {
                    unit_type: Some("Villa".to_string()),
                    area: Some(320.0),
                    price: Some(42_000_000),
                    similarity: 0.72,
                },
            ],
        }];
        let text = discover_answer(&groups, 3, 1);
        assert!(text.starts_with("Top matches (grouped by project):"));
        assert!(text.contains("- Marassi"));
        assert!(text.contains("Chalet — 160 m² — 18,500,000 EGP — North Coast"));
        // Second option trimmed by the per-project cap.
        assert!(!text.contains("Villa"));
    }

    #[test]
    fn superlative_answer_formats_unit() {
        let unit = UnitOffering {
            unit_type: "Studio".to_string(),
            area: Some(65.0),
            price: Some(3_100_000),
            bedrooms: None,
        };
        let text = superlative_answer("Taj City", UnitSuperlative::CheapestUnit, &unit);
        assert!(text.starts_with("Taj City: cheapest option is **Studio**"));
    }
}
