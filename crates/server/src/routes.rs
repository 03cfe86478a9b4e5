//! HTTP surface: one turn endpoint and the free-text discovery endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sakan_agent::orchestrator::{Orchestrator, TurnRequest};
use sakan_core::catalog::DiscoveryGroup;
use sakan_core::errors::ApplicationError;
use sakan_core::intent::Intent;
use sakan_core::preferences;
use sakan_core::reply;
use sakan_core::state::{ConversationId, ConversationState, Listing};
use sakan_db::repositories::{ListingSearch, SearchFilters};
use sakan_db::Embedder;

const DISCOVER_TOP_K: usize = 12;
const DISCOVER_MAX_PROJECTS: usize = 3;
const DISCOVER_MAX_OPTIONS_PER_PROJECT: usize = 2;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub listings: Arc<dyn ListingSearch>,
    pub embedder: Arc<dyn Embedder>,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/chat", post(chat)).route("/discover", post(discover)).with_state(state)
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: ConversationId,
    pub reply: String,
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<Listing>,
    pub state: ConversationState,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let turn = state
        .orchestrator
        .handle_turn(TurnRequest {
            conversation_id: request.conversation_id.map(ConversationId),
            message: request.message,
        })
        .await;

    Json(ChatResponse {
        conversation_id: turn.conversation_id,
        reply: turn.reply,
        intent: turn.intent,
        selected: turn.selected,
        state: turn.state,
    })
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiscoverRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DiscoverResponse {
    pub reply: String,
    pub groups: Vec<DiscoveryGroup>,
}

/// Stateless free-text discovery: deterministic extraction builds the
/// structured filters, the raw query is embedded for ranking, and the
/// requested size acts as a ranking target rather than a hard filter.
pub async fn discover(
    State(state): State<AppState>,
    Json(request): Json<DiscoverRequest>,
) -> (StatusCode, Json<DiscoverResponse>) {
    let patch = preferences::extract(&request.query);
    if patch.is_empty() {
        return (
            StatusCode::OK,
            Json(DiscoverResponse {
                reply: reply::discover_clarification().to_string(),
                groups: Vec::new(),
            }),
        );
    }

    let prefs = ConversationState::default().applied(&patch);
    let target_area = prefs.area_min.or(prefs.area_max);
    let filters = SearchFilters {
        location: prefs.location.clone(),
        unit_type: prefs.unit_type.map(|u| u.display_name().to_string()),
        budget_min: prefs.budget_min,
        budget_max: prefs.budget_max,
        area_min: None,
        area_max: None,
        limit: DISCOVER_TOP_K as i64,
    };

    let embedding = state.embedder.embed(&request.query);
    let k = request.k.unwrap_or(DISCOVER_TOP_K).clamp(1, 50);

    match state.listings.search_similar(&embedding, &filters, target_area, k).await {
        Ok(groups) => {
            let reply =
                reply::discover_answer(&groups, DISCOVER_MAX_PROJECTS, DISCOVER_MAX_OPTIONS_PER_PROJECT);
            (StatusCode::OK, Json(DiscoverResponse { reply, groups }))
        }
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            let interface = ApplicationError::Persistence(error.to_string())
                .into_interface(correlation_id.clone());
            tracing::error!(%correlation_id, %interface, "discovery search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DiscoverResponse {
                    reply: interface.user_message().to_string(),
                    groups: Vec::new(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use sakan_agent::classifier::NoopClassifier;
    use sakan_core::catalog::{ProjectProfile, UnitOffering};
    use sakan_db::repositories::{
        InMemoryConversationStore, InMemoryListingSearch, InMemoryProjectDirectory,
        RepositoryError,
    };
    use sakan_db::HashEmbedder;

    use super::*;

    struct FailingSearch;

    #[async_trait]
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
        ) -> Result<Vec<DiscoveryGroup>, RepositoryError> {
            Err(RepositoryError::Decode("wire torn".to_string()))
        }
    }

    fn catalog() -> Vec<ProjectProfile> {
        vec![
            ProjectProfile {
                id: 7,
                name: "Marassi".to_string(),
                location: Some("North Coast".to_string()),
                developer: None,
                units: vec![UnitOffering {
                    unit_type: "Chalets".to_string(),
                    area: Some(160.0),
                    price: Some(18_500_000),
                    bedrooms: None,
                }],
            },
            ProjectProfile {
                id: 8,
                name: "Telal".to_string(),
                location: Some("North Coast - Sahel".to_string()),
                developer: None,
                units: vec![UnitOffering {
                    unit_type: "Chalets".to_string(),
                    area: Some(185.0),
                    price: Some(15_300_000),
                    bedrooms: None,
                }],
            },
        ]
    }

    fn app_state() -> AppState {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(InMemoryConversationStore::default()),
            Arc::new(InMemoryProjectDirectory::new(catalog())),
            Arc::new(InMemoryListingSearch::new(catalog())),
            Arc::new(NoopClassifier),
            Duration::from_millis(100),
        ));
        AppState {
            orchestrator,
            listings: Arc::new(InMemoryListingSearch::new(catalog())),
            embedder: Arc::new(HashEmbedder),
        }
    }

    #[tokio::test]
    async fn chat_mints_a_conversation_id_and_carries_state() {
        let state = app_state();

        let Json(first) = chat(
            State(state.clone()),
            Json(ChatRequest {
                conversation_id: None,
                message: "chalet in north coast under 20 million".to_string(),
            }),
        )
        .await;
        assert!(first.reply.starts_with("Here are the best matches"));
        assert_eq!(first.state.location.as_deref(), Some("North Coast"));

        let Json(second) = chat(
            State(state),
            Json(ChatRequest {
                conversation_id: Some(first.conversation_id.0),
                message: "option 1".to_string(),
            }),
        )
        .await;
        assert_eq!(second.conversation_id, first.conversation_id);
        assert!(second.reply.starts_with("Option 1 details:"));
        assert!(second.selected.is_some());
    }

    #[tokio::test]
    async fn discover_asks_for_clarification_without_signals() {
        let (status, Json(response)) = discover(
            State(app_state()),
            Json(DiscoverRequest { query: "hello there".to_string(), k: None }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.groups.is_empty());
        assert!(response.reply.contains("Unit type"));
    }

    #[tokio::test]
    async fn discover_maps_a_repository_failure_to_a_user_safe_reply() {
        let mut state = app_state();
        state.listings = Arc::new(FailingSearch);

        let (status, Json(response)) = discover(
            State(state),
            Json(DiscoverRequest {
                query: "chalet in north coast".to_string(),
                k: None,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.groups.is_empty());
        assert_eq!(response.reply, "The service is temporarily unavailable. Please retry shortly.");
    }

    #[tokio::test]
    async fn discover_groups_matches_by_project() {
        let (status, Json(response)) = discover(
            State(app_state()),
            Json(DiscoverRequest {
                query: "chalet 160 sqm in north coast".to_string(),
                k: Some(6),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.reply.starts_with("Top matches (grouped by project):"));
        assert_eq!(response.groups.len(), 2);
        assert!(response.groups.iter().any(|g| g.project_name == "Marassi"));
    }
}
