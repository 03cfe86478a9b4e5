//! Project catalog domain types and per-project unit queries.

use serde::{Deserialize, Serialize};

use crate::intent::UnitSuperlative;

/// One sellable unit configuration within a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitOffering {
    pub unit_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u8>,
}

/// A project with its full unit lineup, as loaded for detail, compare and
/// superlative answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectProfile {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<UnitOffering>,
}

impl ProjectProfile {
    /// The unit answering a superlative question, or `None` when no unit
    /// carries the needed figure. Ties keep the earliest unit.
    pub fn pick_unit(&self, superlative: UnitSuperlative) -> Option<&UnitOffering> {
        let mut best: Option<&UnitOffering> = None;
        for unit in &self.units {
            let better = match superlative {
                UnitSuperlative::LargestUnit => match (unit.area, best.and_then(|b| b.area)) {
                    (Some(area), Some(best_area)) => area > best_area,
                    (Some(_), None) => true,
                    (None, _) => false,
                },
                UnitSuperlative::CheapestUnit => match (unit.price, best.and_then(|b| b.price)) {
                    (Some(price), Some(best_price)) => price < best_price,
                    (Some(_), None) => true,
                    (None, _) => false,
                },
            };
            if better {
                best = Some(unit);
            }
        }
        best
    }

    pub fn min_price(&self) -> Option<i64> {
        self.units.iter().filter_map(|u| u.price).min()
    }

    pub fn max_price(&self) -> Option<i64> {
        self.units.iter().filter_map(|u| u.price).max()
    }

    pub fn min_area(&self) -> Option<f64> {
        self.units
            .iter()
            .filter_map(|u| u.area)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn max_area(&self) -> Option<f64> {
        self.units
            .iter()
            .filter_map(|u| u.area)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// One similarity-scored unit row from a discovery search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    pub similarity: f64,
}

/// Discovery hits for one project. Units arrive already ordered by
/// closeness to the requested size, then price, then similarity; groups
/// arrive ordered by their best similarity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryGroup {
    pub project_id: i64,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub units: Vec<ScoredUnit>,
}
