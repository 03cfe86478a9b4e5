//! The per-turn state machine.
//!
//! Branches are checked in a fixed order: selection against the last
//! shown results, reset/refinement, per-project superlatives, comparison,
//! details, then preference merge and slot-filling ending in a search.
//! A turn never fails outward: repository errors degrade to a templated
//! retry reply and the stored state is left as it was.

use std::sync::Arc;
use std::time::Duration;

use sakan_core::catalog::ProjectProfile;
use sakan_core::compare::{self, MAX_COMPARE_TARGETS};
use sakan_core::intent::{self, Intent, UnitSuperlative};
use sakan_core::refine::{self, Refinement};
use sakan_core::reply::{self, Slot};
use sakan_core::selection::{self, Resolution};
use sakan_core::state::{ConversationId, ConversationState, Field, Listing, StatePatch};
use sakan_core::text;

use sakan_db::repositories::{
    ConversationStore, ListingSearch, ProjectDirectory, RepositoryError, SearchFilters,
};

use crate::classifier::{self, FallbackClassifier};
use crate::locks::ConversationLocks;

const SEARCH_LIMIT: i64 = 10;
const TRANSCRIPT_CONTEXT: i64 = 6;

/// One inbound turn. A missing id starts a new conversation.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub conversation_id: Option<ConversationId>,
    pub message: String,
}

/// Outcome of a turn, always produced.
#[derive(Clone, Debug)]
pub struct TurnResponse {
    pub conversation_id: ConversationId,
    pub reply: String,
    pub intent: Intent,
    pub selected: Option<Listing>,
    pub state: ConversationState,
}

struct TurnOutcome {
    reply: String,
    intent: Intent,
    selected: Option<Listing>,
    state: ConversationState,
}

impl TurnOutcome {
    fn new(reply: impl Into<String>, intent: Intent, state: ConversationState) -> Self {
        Self { reply: reply.into(), intent, selected: None, state }
    }
}

pub struct Orchestrator {
    conversations: Arc<dyn ConversationStore>,
    projects: Arc<dyn ProjectDirectory>,
    listings: Arc<dyn ListingSearch>,
    fallback: Arc<dyn FallbackClassifier>,
    fallback_timeout: Duration,
    locks: ConversationLocks,
}

impl Orchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        projects: Arc<dyn ProjectDirectory>,
        listings: Arc<dyn ListingSearch>,
        fallback: Arc<dyn FallbackClassifier>,
        fallback_timeout: Duration,
    ) -> Self {
        Self {
            conversations,
            projects,
            listings,
            fallback,
            fallback_timeout,
            locks: ConversationLocks::new(),
        }
    }

    /// Handles one turn end to end: lock, transition, transcript. Never
    /// fails; errors degrade to a retry reply.
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let id = request.conversation_id.unwrap_or_default();
        let _guard = self.locks.acquire(&id).await;
        let message = request.message.trim().to_string();

        let outcome = match self.run_turn(&id, &message).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, conversation = %id, "turn failed");
                let state = self.conversations.get(&id).await.ok().flatten().unwrap_or_default();
                TurnOutcome::new(reply::search_failed(), Intent::Unknown, state)
            }
        };

        let label = intent_label(outcome.intent);
        if !message.is_empty() {
            if let Err(error) =
                self.conversations.append_message(&id, "user", &message, Some(label)).await
            {
                tracing::warn!(%error, conversation = %id, "failed to record user turn");
            }
        }
        if let Err(error) =
            self.conversations.append_message(&id, "assistant", &outcome.reply, None).await
        {
            tracing::warn!(%error, conversation = %id, "failed to record assistant turn");
        }

        TurnResponse {
            conversation_id: id,
            reply: outcome.reply,
            intent: outcome.intent,
            selected: outcome.selected,
            state: outcome.state,
        }
    }

    async fn run_turn(
        &self,
        id: &ConversationId,
        message: &str,
    ) -> Result<TurnOutcome, RepositoryError> {
        let state = self.conversations.create(id).await?;

        if message.is_empty() {
            return Ok(TurnOutcome::new(reply::nothing_to_search(), Intent::Unknown, state));
        }

        // 1. Selection against the last shown results.
        if !state.last_results.is_empty() {
            match selection::resolve_choice(message, &state.last_results) {
                Resolution::Chosen { listing, index } => {
                    let mut remembered = vec![listing.project_id];
                    remembered.extend(state.last_project_ids.iter().copied());
                    let patch = StatePatch {
                        confirmed: Field::Set(true),
                        chosen_option: Field::Set(listing.clone()),
                        last_project_ids: Field::Set(remembered),
                        ..Default::default()
                    };
                    let state = self.conversations.merge(id, &patch).await?;
                    let mut outcome = TurnOutcome::new(
                        reply::selected_option(&listing, index + 1),
                        Intent::ConfirmChoice,
                        state,
                    );
                    outcome.selected = Some(listing);
                    return Ok(outcome);
                }
                Resolution::OutOfRange { given, available } => {
                    return Ok(TurnOutcome::new(
                        reply::option_out_of_range(given, available),
                        Intent::ConfirmChoice,
                        state,
                    ));
                }
                Resolution::UnknownProjectId(pid) => {
                    return Ok(TurnOutcome::new(
                        reply::unknown_project(pid),
                        Intent::ConfirmChoice,
                        state,
                    ));
                }
                Resolution::NotASelection => {}
            }
        }

        // 2. Reset and relative refinements. Adjustments only apply when
        // the turn reads as a refinement at rule level, so a fresh
        // preference message ("under 6 million") still goes through full
        // extraction below.
        let rule_hit = intent::detect_rules(message);
        match refine::build_refine_patch(message, &state) {
            Refinement::Reset(patch) => {
                let state = self.conversations.merge(id, &patch).await?;
                return Ok(TurnOutcome::new(reply::restarted(), Intent::Restart, state));
            }
            Refinement::Adjusted(patch) if rule_hit == Some(Intent::RefineSearch) => {
                let state = self.conversations.merge(id, &patch).await?;
                if let Some(slot) = first_missing_slot(&state) {
                    return Ok(TurnOutcome::new(
                        reply::slot_question(slot),
                        Intent::RefineSearch,
                        state,
                    ));
                }
                let mut outcome = self.run_search(id, state).await?;
                outcome.intent = Intent::RefineSearch;
                return Ok(outcome);
            }
            _ => {}
        }

        // 3. Per-project superlatives ("cheapest unit in project 12").
        if let Some(superlative) = intent::detect_unit_superlative(message) {
            return self.answer_superlative(id, message, superlative, state).await;
        }

        // 4. Route the turn: rules first, fallback under its timeout.
        let recent_turns = self.recent_turns(id).await;
        let routed = classifier::route(
            self.fallback.as_ref(),
            self.fallback_timeout,
            message,
            &state,
            recent_turns,
        )
        .await;

        if routed.intent == Intent::ConfirmChoice {
            if let Some(chosen) = state.chosen_option.clone() {
                let mut outcome = TurnOutcome::new(
                    reply::visit_confirmed(&chosen),
                    Intent::ConfirmChoice,
                    state,
                );
                outcome.selected = Some(chosen);
                return Ok(outcome);
            }
        }

        match routed.intent {
            Intent::Compare => self.answer_compare(id, message, state).await,
            Intent::ShowDetails => self.answer_details(id, message, state).await,
            intent => {
                // 5. Merge preferences, then ask the next slot or search.
                let mut patch = routed.patch;
                let state = if patch.is_empty() {
                    state
                } else {
                    // New preferences invalidate any prior confirmation.
                    if patch.confirmed.is_keep() {
                        patch.confirmed = Field::Clear;
                    }
                    if patch.chosen_option.is_keep() {
                        patch.chosen_option = Field::Clear;
                    }
                    self.conversations.merge(id, &patch).await?
                };

                if let Some(slot) = first_missing_slot(&state) {
                    return Ok(TurnOutcome::new(reply::slot_question(slot), intent, state));
                }
                let mut outcome = self.run_search(id, state).await?;
                outcome.intent = intent;
                Ok(outcome)
            }
        }
    }

    async fn answer_superlative(
        &self,
        id: &ConversationId,
        message: &str,
        superlative: UnitSuperlative,
        state: ConversationState,
    ) -> Result<TurnOutcome, RepositoryError> {
        let project_id = selection::extract_project_id(message)
            .or_else(|| compare::extract_numbers(message).first().copied())
            .or_else(|| state.last_project_ids.first().copied());
        let Some(pid) = project_id else {
            return Ok(TurnOutcome::new(
                reply::superlative_needs_project(),
                Intent::ShowDetails,
                state,
            ));
        };

        let Some(project) = self.projects.project_with_units(pid).await? else {
            return Ok(TurnOutcome::new(reply::unknown_project(pid), Intent::ShowDetails, state));
        };

        let state = self.remember(id, &state, &[project.id]).await?;
        let text = match project.pick_unit(superlative) {
            Some(unit) => reply::superlative_answer(&project.name, superlative, unit),
            None => reply::superlative_no_unit_data(&project.name),
        };
        Ok(TurnOutcome::new(text, Intent::ShowDetails, state))
    }

    async fn answer_compare(
        &self,
        id: &ConversationId,
        message: &str,
        state: ConversationState,
    ) -> Result<TurnOutcome, RepositoryError> {
        let numbers = compare::extract_numbers(message);
        let names = compare::split_compare_names(message);
        let mut ids = compare::map_option_indexes(message, &numbers, &state.last_project_ids);

        if ids.len() < 2 && !names.is_empty() {
            let mut resolved = Vec::new();
            for name in names.iter().take(MAX_COMPARE_TARGETS) {
                if let Some((profile, _)) =
                    self.projects.search_ranked(name, 8).await?.into_iter().next()
                {
                    resolved.push(profile.id);
                }
            }
            if resolved.len() >= 2 {
                ids = resolved;
            }
        }

        if ids.len() < 2 && state.last_project_ids.len() >= 2 {
            let take = state.last_project_ids.len().min(MAX_COMPARE_TARGETS);
            ids = state.last_project_ids[..take].to_vec();
        }

        if ids.len() < 2 {
            let text = if numbers.is_empty() && names.is_empty() {
                reply::compare_needs_targets()
            } else {
                reply::compare_unresolved()
            };
            return Ok(TurnOutcome::new(text, Intent::Compare, state));
        }

        ids.truncate(MAX_COMPARE_TARGETS);
        let projects = self.projects.projects_with_units(&ids).await?;
        if projects.len() < 2 {
            return Ok(TurnOutcome::new(
                reply::compare_not_enough_found(),
                Intent::Compare,
                state,
            ));
        }

        let compared: Vec<i64> = projects.iter().map(|p| p.id).collect();
        let state = self.remember(id, &state, &compared).await?;
        let comparison = compare::compare_projects(&projects);
        Ok(TurnOutcome::new(reply::compare_summary(&comparison), Intent::Compare, state))
    }

    async fn answer_details(
        &self,
        id: &ConversationId,
        message: &str,
        state: ConversationState,
    ) -> Result<TurnOutcome, RepositoryError> {
        if let Some(pid) = selection::extract_project_id(message) {
            let Some(project) = self.projects.project_with_units(pid).await? else {
                return Ok(TurnOutcome::new(
                    reply::unknown_project(pid),
                    Intent::ShowDetails,
                    state,
                ));
            };
            let state = self.remember(id, &state, &[project.id]).await?;
            return Ok(TurnOutcome::new(
                reply::project_details(&project),
                Intent::ShowDetails,
                state,
            ));
        }

        let query = details_query(message);
        if query.is_empty() {
            return Ok(TurnOutcome::new(
                reply::details_needs_project(),
                Intent::ShowDetails,
                state,
            ));
        }

        let hits = self.projects.search_ranked(&query, 8).await?;
        let Some((top, top_score)) = hits.first().cloned() else {
            return Ok(TurnOutcome::new(
                reply::details_needs_project(),
                Intent::ShowDetails,
                state,
            ));
        };

        // Several projects sharing the best-ranked name need an explicit
        // pick by id.
        let top_name = text::normalize(&top.name);
        let twins: Vec<ProjectProfile> = hits
            .iter()
            .filter(|(p, score)| *score == top_score && text::normalize(&p.name) == top_name)
            .map(|(p, _)| p.clone())
            .collect();
        if twins.len() >= 2 {
            return Ok(TurnOutcome::new(
                reply::disambiguate_projects(&twins),
                Intent::ShowDetails,
                state,
            ));
        }

        let state = self.remember(id, &state, &[top.id]).await?;
        Ok(TurnOutcome::new(reply::project_details(&top), Intent::ShowDetails, state))
    }

    /// Search with the accumulated filters, store result memory, and word
    /// the reply. A failing search keeps the stored state as it was.
    async fn run_search(
        &self,
        id: &ConversationId,
        state: ConversationState,
    ) -> Result<TurnOutcome, RepositoryError> {
        let filters = SearchFilters {
            location: state.location.clone(),
            unit_type: state.unit_type.map(|u| u.display_name().to_string()),
            budget_min: state.budget_min,
            budget_max: state.budget_max,
            area_min: state.area_min,
            area_max: state.area_max,
            limit: SEARCH_LIMIT,
        };

        let results = match self.listings.search(&filters).await {
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(%error, conversation = %id, "listing search failed");
                return Ok(TurnOutcome::new(
                    reply::search_failed(),
                    Intent::ProvidePreferences,
                    state,
                ));
            }
        };

        if results.is_empty() {
            let hint = match (state.location.as_deref(), state.unit_type) {
                (Some(location), Some(unit_type)) => self
                    .projects
                    .min_price(location, unit_type.display_name())
                    .await?
                    .map(|price| (price, location, unit_type.display_name())),
                _ => None,
            };
            let text = reply::no_matches(hint);
            let state = self
                .conversations
                .merge(id, &StatePatch { last_results: Field::Clear, ..Default::default() })
                .await?;
            return Ok(TurnOutcome::new(text, Intent::ProvidePreferences, state));
        }

        let mut remembered: Vec<i64> = results.iter().map(|r| r.project_id).collect();
        remembered.extend(state.last_project_ids.iter().copied());
        let patch = StatePatch {
            last_results: Field::Set(results.clone()),
            last_project_ids: Field::Set(remembered),
            ..Default::default()
        };
        let state = self.conversations.merge(id, &patch).await?;
        Ok(TurnOutcome::new(reply::results_list(&results), Intent::ProvidePreferences, state))
    }

    async fn remember(
        &self,
        id: &ConversationId,
        state: &ConversationState,
        ids: &[i64],
    ) -> Result<ConversationState, RepositoryError> {
        let mut combined: Vec<i64> = ids.to_vec();
        combined.extend(state.last_project_ids.iter().copied());
        let patch =
            StatePatch { last_project_ids: Field::Set(combined), ..Default::default() };
        self.conversations.merge(id, &patch).await
    }

    async fn recent_turns(&self, id: &ConversationId) -> Vec<String> {
        match self.conversations.recent_messages(id, TRANSCRIPT_CONTEXT).await {
            Ok(messages) => {
                messages.into_iter().map(|m| format!("{}: {}", m.role, m.content)).collect()
            }
            Err(error) => {
                tracing::warn!(%error, conversation = %id, "failed to load transcript context");
                Vec::new()
            }
        }
    }
}

/// Required slots in asking order. Bedrooms and payment plan are stored
/// when offered but never block a search.
fn first_missing_slot(state: &ConversationState) -> Option<Slot> {
    if state.location.is_none() {
        Some(Slot::Location)
    } else if state.budget_max.is_none() {
        Some(Slot::BudgetMax)
    } else if state.unit_type.is_none() {
        Some(Slot::UnitType)
    } else {
        None
    }
}

const DETAIL_STOPWORDS: &[&str] = &[
    "tell", "me", "more", "about", "details", "detail", "info", "information", "describe",
    "show", "of", "the", "a", "project", "تفاصيل", "معلومات", "عن", "احكي", "قولي", "قوللي",
    "وصف", "مشروع",
];

/// Strips detail-trigger words so the remainder can be name-searched.
fn details_query(message: &str) -> String {
    text::normalize(message)
        .split_whitespace()
        .filter(|word| !DETAIL_STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::Restart => "restart",
        Intent::Compare => "compare",
        Intent::ConfirmChoice => "confirm_choice",
        Intent::ShowDetails => "show_details",
        Intent::FilterResults => "filter_results",
        Intent::SortResults => "sort_results",
        Intent::Navigate => "navigate",
        Intent::RefineSearch => "refine_search",
        Intent::ShowResults => "show_results",
        Intent::ProvidePreferences => "provide_preferences",
        Intent::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakan_core::catalog::UnitOffering;
    use sakan_db::repositories::{
        InMemoryConversationStore, InMemoryListingSearch, InMemoryProjectDirectory,
    };

    use crate::classifier::NoopClassifier;

    fn catalog() -> Vec<ProjectProfile> {
        vec![
            ProjectProfile {
                id: 1,
                name: "Taj City".to_string(),
                location: Some("New Cairo".to_string()),
                developer: None,
                units: vec![
                    UnitOffering {
                        unit_type: "Apartments".to_string(),
                        area: Some(140.0),
                        price: Some(5_828_966),
                        bedrooms: Some(3),
                    },
                    UnitOffering {
                        unit_type: "Duplex".to_string(),
                        area: Some(230.0),
                        price: Some(10_900_000),
                        bedrooms: Some(4),
                    },
                ],
            },
            ProjectProfile {
                id: 2,
                name: "Sarai".to_string(),
                location: Some("Mostakbal City - New Cairo".to_string()),
                developer: None,
                units: vec![UnitOffering {
                    unit_type: "Apartments".to_string(),
                    area: Some(128.0),
                    price: Some(4_690_000),
                    bedrooms: Some(3),
                }],
            },
            ProjectProfile {
                id: 7,
                name: "Marassi".to_string(),
                location: Some("North Coast".to_string()),
                developer: None,
                units: vec![UnitOffering {
                    unit_type: "Chalets".to_string(),
                    area: Some(160.0),
                    price: Some(18_500_000),
                    bedrooms: Some(2),
                }],
            },
        ]
    }

    fn orchestrator() -> Orchestrator {
        orchestrator_with_search(Arc::new(InMemoryListingSearch::new(catalog())))
    }

    fn orchestrator_with_search(listings: Arc<dyn ListingSearch>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemoryConversationStore::default()),
            Arc::new(InMemoryProjectDirectory::new(catalog())),
            listings,
            Arc::new(NoopClassifier),
            Duration::from_millis(100),
        )
    }

    async fn turn(orch: &Orchestrator, id: Option<ConversationId>, message: &str) -> TurnResponse {
        orch.handle_turn(TurnRequest {
            conversation_id: id,
            message: message.to_string(),
        })
        .await
    }

    #[tokio::test]
    async fn out_of_range_option_is_reported() {
        let orch = orchestrator();
        let first = turn(&orch, None, "apartment in new cairo under 6 million").await;
        let id = first.conversation_id;

        let response = turn(&orch, Some(id), "option 9").await;
        assert_eq!(response.reply, reply::option_out_of_range(9, 2));
        assert!(!response.state.confirmed);
    }

    #[tokio::test]
    async fn superlative_uses_the_most_recent_project() {
        let orch = orchestrator();
        let first = turn(&orch, None, "apartment in new cairo under 6 million").await;
        let id = first.conversation_id;

        let response = turn(&orch, Some(id), "what's the cheapest unit").await;
        // Front of the remembered list is the top-ranked result.
        assert!(response.reply.starts_with("Taj City: cheapest option is **Apartments**"));
    }

    #[tokio::test]
    async fn superlative_without_any_project_asks_for_one() {
        let orch = orchestrator();
        let response = turn(&orch, None, "cheapest unit").await;
        assert_eq!(response.reply, reply::superlative_needs_project());
    }

    #[tokio::test]
    async fn compare_by_names_resolves_through_the_directory() {
        let orch = orchestrator();
        let response = turn(&orch, None, "Compare Taj City vs Marassi").await;
        assert_eq!(response.intent, Intent::Compare);
        assert!(response.reply.starts_with("Comparison of: Taj City, Marassi."));
        assert_eq!(response.state.last_project_ids, vec![1, 7]);
    }

    #[tokio::test]
    async fn compare_without_targets_asks_for_them() {
        let orch = orchestrator();
        let response = turn(&orch, None, "compare").await;
        assert_eq!(response.reply, reply::compare_needs_targets());

        // Named but unresolvable targets get the unresolved wording.
        let response = turn(&orch, None, "compare them please").await;
        assert_eq!(response.reply, reply::compare_unresolved());
    }

    #[tokio::test]
    async fn details_by_name_after_stripping_triggers() {
        let orch = orchestrator();
        let response = turn(&orch, None, "details about taj city").await;
        assert_eq!(response.intent, Intent::ShowDetails);
        assert!(response.reply.starts_with("Taj City — New Cairo"));
        assert_eq!(response.state.last_project_ids, vec![1]);
    }

    #[tokio::test]
    async fn refinement_adjusts_budget_and_researches() {
        let orch = orchestrator();
        let first = turn(&orch, None, "apartment in new cairo under 6 million").await;
        let id = first.conversation_id;

        let cheaper = turn(&orch, Some(id), "cheaper please").await;
        assert_eq!(cheaper.intent, Intent::RefineSearch);
        assert_eq!(cheaper.state.budget_max, Some(5_400_000));
        // Taj City's 5.83M now exceeds the ceiling; Sarai leads.
        assert!(cheaper.reply.contains("1) Sarai"));
    }

    #[tokio::test]
    async fn no_matches_includes_the_min_price_hint() {
        let orch = orchestrator();
        let response =
            turn(&orch, None, "chalet in north coast under 2 million").await;
        assert!(response.reply.contains("Lowest available in North Coast for Chalet"));
        assert!(response.reply.contains("18,500,000"));
    }

    #[tokio::test]
    async fn empty_message_asks_what_to_search_for() {
        let orch = orchestrator();
        let response = turn(&orch, None, "   ").await;
        assert_eq!(response.reply, reply::nothing_to_search());
    }

    #[tokio::test]
    async fn search_failure_keeps_preferences_and_replies_retry() {
        struct FailingSearch;

        #[async_trait::async_trait]
        impl ListingSearch for FailingSearch {
            async fn search(
                &self,
                _filters: &SearchFilters,
            ) -> Result<Vec<Listing>, RepositoryError> {
                Err(RepositoryError::Decode("wire torn".to_string()))
            }

            async fn search_similar(
                &self,
                _query_embedding: &[f32],
                _filters: &SearchFilters,
                _target_area: Option<f64>,
                _k: usize,
            ) -> Result<Vec<sakan_core::catalog::DiscoveryGroup>, RepositoryError> {
                Err(RepositoryError::Decode("wire torn".to_string()))
            }
        }

        let orch = orchestrator_with_search(Arc::new(FailingSearch));
        let response = turn(&orch, None, "apartment in new cairo under 6 million").await;
        assert_eq!(response.reply, reply::search_failed());
        // Preferences survive; result memory stays empty.
        assert_eq!(response.state.location.as_deref(), Some("New Cairo"));
        assert!(response.state.last_results.is_empty());
    }
}
