//! Conversation state, the sparse patch type, and merge semantics.
//!
//! A patch follows the JSON convention "absent key keeps, null clears":
//! every field is a three-state [`Field`] so an explicit reset can clear a
//! slot without ambiguity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier of one conversation. Minted on the first turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Canonical unit types. Matching against user text goes through the
/// synonym table in [`crate::lexicon`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Apartment,
    Villa,
    Studio,
    Duplex,
    Penthouse,
    Chalet,
    TownHouse,
    TwinHouse,
    Loft,
    Cabin,
    Office,
}

impl UnitType {
    /// Display name as stored in listing rows ("Town House", not "town_house").
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Apartment => "Apartment",
            Self::Villa => "Villa",
            Self::Studio => "Studio",
            Self::Duplex => "Duplex",
            Self::Penthouse => "Penthouse",
            Self::Chalet => "Chalet",
            Self::TownHouse => "Town House",
            Self::TwinHouse => "Twin House",
            Self::Loft => "Lofts",
            Self::Cabin => "Cabins",
            Self::Office => "Offices",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorType {
    GroundFloor,
    FirstFloor,
    SecondFloor,
    MiddleFloor,
    LowFloor,
    HighFloor,
    TopFloor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Sea,
    Garden,
    Pool,
    Street,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Furnishing {
    Unfurnished,
    Semi,
    Furnished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePreference {
    Compact,
    Spacious,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlan {
    Cash,
    Installments,
    Either,
}

/// Per-turn feature flags, OR-combined by the extractor before they land
/// in a patch. Replaced wholesale on merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_garden: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_roof: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_terrace: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_balcony: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furnishing: Option<Furnishing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_preference: Option<SizePreference>,
}

impl Features {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Slim projection of a retrieval row, kept in state for back-reference.
/// Ranking scores never survive into this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub project_id: i64,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

/// One slot in a [`StatePatch`]: absent keeps the stored value, an explicit
/// null clears it, anything else overwrites it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Field::Keep)
    }

    pub fn set_if_keep(&mut self, value: T) {
        if self.is_keep() {
            *self = Field::Set(value);
        }
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }

    fn apply_to(&self, slot: &mut Option<T>)
    where
        T: Clone,
    {
        match self {
            Field::Keep => {}
            Field::Clear => *slot = None,
            Field::Set(value) => *slot = Some(value.clone()),
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Keep is skipped at the struct level; serializing it anyway
            // degrades to null rather than panicking.
            Field::Keep | Field::Clear => serializer.serialize_none(),
            Field::Set(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Field::Set(value),
            None => Field::Clear,
        })
    }
}

/// Sparse update produced by one turn. Only fields carried by the patch
/// touch the stored state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub location: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub budget_min: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub budget_max: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub area_min: Field<f64>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub area_max: Field<f64>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub unit_type: Field<UnitType>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub bedrooms: Field<u8>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub floor_type: Field<FloorType>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub features: Field<Features>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub payment_plan: Field<PaymentPlan>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub confirmed: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub chosen_option: Field<Listing>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub last_results: Field<Vec<Listing>>,
    #[serde(default, skip_serializing_if = "Field::is_keep")]
    pub last_project_ids: Field<Vec<i64>>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlays `other` on top of `self`: fields `other` actually carries
    /// (Set or Clear) win. This is the two-pass merge used to let the
    /// deterministic extractor override classifier entities.
    pub fn overlay(mut self, other: &StatePatch) -> StatePatch {
        macro_rules! overlay_field {
            ($field:ident) => {
                if !other.$field.is_keep() {
                    self.$field = other.$field.clone();
                }
            };
        }
        overlay_field!(location);
        overlay_field!(budget_min);
        overlay_field!(budget_max);
        overlay_field!(area_min);
        overlay_field!(area_max);
        overlay_field!(unit_type);
        overlay_field!(bedrooms);
        overlay_field!(floor_type);
        overlay_field!(features);
        overlay_field!(payment_plan);
        overlay_field!(confirmed);
        overlay_field!(chosen_option);
        overlay_field!(last_results);
        overlay_field!(last_project_ids);
        self
    }
}

/// Full conversation state. Owned by the orchestrator, mutated only
/// through [`ConversationState::apply`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub location: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub area_min: Option<f64>,
    pub area_max: Option<f64>,
    pub unit_type: Option<UnitType>,
    pub bedrooms: Option<u8>,
    pub floor_type: Option<FloorType>,
    pub features: Features,
    pub payment_plan: Option<PaymentPlan>,
    pub confirmed: bool,
    pub chosen_option: Option<Listing>,
    pub last_results: Vec<Listing>,
    pub last_project_ids: Vec<i64>,
}

impl ConversationState {
    /// Applies a patch in place. The whole patch lands or none of it does
    /// (this type never partially fails), and the bound-ordering invariants
    /// are re-established afterwards.
    pub fn apply(&mut self, patch: &StatePatch) {
        patch.location.apply_to(&mut self.location);
        patch.budget_min.apply_to(&mut self.budget_min);
        patch.budget_max.apply_to(&mut self.budget_max);
        patch.area_min.apply_to(&mut self.area_min);
        patch.area_max.apply_to(&mut self.area_max);
        patch.unit_type.apply_to(&mut self.unit_type);
        patch.bedrooms.apply_to(&mut self.bedrooms);
        patch.floor_type.apply_to(&mut self.floor_type);
        patch.payment_plan.apply_to(&mut self.payment_plan);
        patch.chosen_option.apply_to(&mut self.chosen_option);

        match &patch.features {
            Field::Keep => {}
            Field::Clear => self.features = Features::default(),
            Field::Set(features) => self.features = features.clone(),
        }
        match &patch.confirmed {
            Field::Keep => {}
            Field::Clear => self.confirmed = false,
            Field::Set(confirmed) => self.confirmed = *confirmed,
        }
        match &patch.last_results {
            Field::Keep => {}
            Field::Clear => self.last_results.clear(),
            Field::Set(results) => self.last_results = results.clone(),
        }
        match &patch.last_project_ids {
            Field::Keep => {}
            Field::Clear => self.last_project_ids.clear(),
            Field::Set(ids) => self.last_project_ids = dedup_preserving_order(ids),
        }

        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            if min > max {
                self.budget_min = Some(max);
                self.budget_max = Some(min);
            }
        }
        if let (Some(min), Some(max)) = (self.area_min, self.area_max) {
            if min > max {
                self.area_min = Some(max);
                self.area_max = Some(min);
            }
        }
    }

    /// Remembers entities for compare/detail follow-ups: `ids` go to the
    /// front, previous memory follows, duplicates drop.
    pub fn remember_project_ids(&mut self, ids: &[i64]) {
        let mut combined: Vec<i64> = ids.to_vec();
        combined.extend(self.last_project_ids.iter().copied());
        self.last_project_ids = dedup_preserving_order(&combined);
    }

    pub fn applied(&self, patch: &StatePatch) -> ConversationState {
        let mut next = self.clone();
        next.apply(patch);
        next
    }
}

fn dedup_preserving_order(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: i64, name: &str) -> Listing {
        Listing {
            project_id: id,
            project_name: name.to_string(),
            location: Some("New Cairo".to_string()),
            unit_type: Some("Apartment".to_string()),
            area: Some(140.0),
            price: Some(5_500_000),
        }
    }

    #[test]
    fn absent_field_keeps_stored_value() {
        let mut state = ConversationState {
            location: Some("New Cairo".to_string()),
            ..Default::default()
        };
        state.apply(&StatePatch { budget_max: Field::Set(6_000_000), ..Default::default() });
        assert_eq!(state.location.as_deref(), Some("New Cairo"));
        assert_eq!(state.budget_max, Some(6_000_000));
    }

    #[test]
    fn explicit_clear_resets_the_slot() {
        let mut state = ConversationState {
            location: Some("New Cairo".to_string()),
            budget_max: Some(6_000_000),
            ..Default::default()
        };
        state.apply(&StatePatch { location: Field::Clear, ..Default::default() });
        assert_eq!(state.location, None);
        assert_eq!(state.budget_max, Some(6_000_000));
    }

    #[test]
    fn patch_merge_is_idempotent() {
        let patch = StatePatch {
            location: Field::Set("Zayed".to_string()),
            budget_max: Field::Set(4_000_000),
            bedrooms: Field::Set(3),
            ..Default::default()
        };
        let once = ConversationState::default().applied(&patch);
        let twice = once.applied(&patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn bounds_are_reordered_regardless_of_arrival_order() {
        let mut state = ConversationState::default();
        state.apply(&StatePatch { budget_max: Field::Set(3_000_000), ..Default::default() });
        state.apply(&StatePatch { budget_min: Field::Set(5_000_000), ..Default::default() });
        assert_eq!(state.budget_min, Some(3_000_000));
        assert_eq!(state.budget_max, Some(5_000_000));

        let mut state = ConversationState::default();
        state.apply(&StatePatch {
            area_min: Field::Set(180.0),
            area_max: Field::Set(120.0),
            ..Default::default()
        });
        assert_eq!(state.area_min, Some(120.0));
        assert_eq!(state.area_max, Some(180.0));
    }

    #[test]
    fn overlay_lets_second_patch_win_on_conflicts_only() {
        let ai = StatePatch {
            location: Field::Set("october".to_string()),
            bedrooms: Field::Set(2),
            ..Default::default()
        };
        let deterministic = StatePatch {
            location: Field::Set("New Cairo".to_string()),
            budget_max: Field::Set(8_000_000),
            ..Default::default()
        };
        let merged = ai.overlay(&deterministic);
        assert_eq!(merged.location, Field::Set("New Cairo".to_string()));
        assert_eq!(merged.bedrooms, Field::Set(2));
        assert_eq!(merged.budget_max, Field::Set(8_000_000));
    }

    #[test]
    fn last_project_ids_deduplicate_preserving_order() {
        let mut state = ConversationState::default();
        state.apply(&StatePatch {
            last_project_ids: Field::Set(vec![7, 3, 7, 9, 3]),
            ..Default::default()
        });
        assert_eq!(state.last_project_ids, vec![7, 3, 9]);
    }

    #[test]
    fn remember_front_loads_most_recent() {
        let mut state = ConversationState {
            last_project_ids: vec![4, 5, 6],
            ..Default::default()
        };
        state.remember_project_ids(&[6, 9]);
        assert_eq!(state.last_project_ids, vec![6, 9, 4, 5]);
    }

    #[test]
    fn patch_json_distinguishes_absent_from_null() {
        let patch: StatePatch =
            serde_json::from_str(r#"{"location": null, "budget_max": 5000000}"#).unwrap();
        assert_eq!(patch.location, Field::Clear);
        assert_eq!(patch.budget_max, Field::Set(5_000_000));
        assert!(patch.unit_type.is_keep());

        let json = serde_json::to_value(&patch).unwrap();
        assert!(json.get("unit_type").is_none());
        assert!(json.get("location").is_some_and(|v| v.is_null()));
    }

    #[test]
    fn state_round_trips_and_backfills_missing_keys() {
        let state = ConversationState {
            location: Some("North Coast".to_string()),
            last_results: vec![listing(1, "Marassi")],
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);

        // Older blobs without newer keys deserialize with defaults.
        let sparse: ConversationState =
            serde_json::from_str(r#"{"location": "Zayed"}"#).unwrap();
        assert_eq!(sparse.location.as_deref(), Some("Zayed"));
        assert!(sparse.last_project_ids.is_empty());
    }
}
