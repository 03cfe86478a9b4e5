//! In-memory repository doubles for orchestrator and CLI tests.

use std::collections::HashMap;

use tokio::sync::RwLock;

use sakan_core::catalog::{DiscoveryGroup, ProjectProfile, ScoredUnit};
use sakan_core::state::{ConversationId, ConversationState, Listing, StatePatch};
use sakan_core::text::normalize;

use super::{
    ConversationStore, ListingSearch, ProjectDirectory, RepositoryError, SearchFilters,
    StoredMessage,
};
use crate::repositories::listing::group_hits;

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, ConversationState>>,
    messages: RwLock<HashMap<String, Vec<StoredMessage>>>,
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0.to_string()).cloned())
    }

    async fn create(&self, id: &ConversationId) -> Result<ConversationState, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        Ok(conversations.entry(id.0.to_string()).or_default().clone())
    }

    async fn merge(
        &self,
        id: &ConversationId,
        patch: &StatePatch,
    ) -> Result<ConversationState, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let state = conversations.entry(id.0.to_string()).or_default();
        state.apply(patch);
        Ok(state.clone())
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        role: &str,
        content: &str,
        intent: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.entry(id.0.to_string()).or_default().push(StoredMessage {
            role: role.to_string(),
            content: content.to_string(),
            intent: intent.map(str::to_string),
            created_at: String::new(),
        });
        Ok(())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        let all = messages.get(&id.0.to_string()).cloned().unwrap_or_default();
        let skip = all.len().saturating_sub(limit.max(0) as usize);
        Ok(all.into_iter().skip(skip).collect())
    }
}

/// Backs both the directory and search traits with a fixed project list.
pub struct InMemoryProjectDirectory {
    projects: Vec<ProjectProfile>,
}

impl InMemoryProjectDirectory {
    pub fn new(projects: Vec<ProjectProfile>) -> Self {
        Self { projects }
    }
}

#[async_trait::async_trait]
impl ProjectDirectory for InMemoryProjectDirectory {
    async fn project_with_units(
        &self,
        id: i64,
    ) -> Result<Option<ProjectProfile>, RepositoryError> {
        Ok(self.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn projects_with_units(
        &self,
        ids: &[i64],
    ) -> Result<Vec<ProjectProfile>, RepositoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.projects.iter().find(|p| p.id == *id).cloned())
            .collect())
    }

    async fn search_ranked(
        &self,
        name: &str,
        limit: i64,
    ) -> Result<Vec<(ProjectProfile, u8)>, RepositoryError> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(ProjectProfile, u8)> = self
            .projects
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .take(limit.max(0) as usize)
            .map(|p| {
                let lowered = p.name.to_lowercase();
                let score = if lowered == needle {
                    3
                } else if lowered.starts_with(&needle) {
                    2
                } else {
                    1
                };
                (p.clone(), score)
            })
            .collect();
        scored
            .sort_by(|a, b| b.1.cmp(&a.1).then_with(|| normalize(&a.0.name).cmp(&normalize(&b.0.name))));
        Ok(scored)
    }

    async fn min_price(
        &self,
        location: &str,
        unit_type: &str,
    ) -> Result<Option<i64>, RepositoryError> {
        let loc = location.to_lowercase();
        let ut = unit_type.to_lowercase();
        Ok(self
            .projects
            .iter()
            .filter(|p| {
                p.location.as_deref().map(str::to_lowercase).unwrap_or_default().contains(&loc)
            })
            .flat_map(|p| p.units.iter())
            .filter(|u| u.unit_type.to_lowercase().contains(&ut))
            .filter_map(|u| u.price)
            .min())
    }
}

/// Listing search over the same fixed project list, replicating the SQL
/// filter and ranking rules.
pub struct InMemoryListingSearch {
    projects: Vec<ProjectProfile>,
}

impl InMemoryListingSearch {
    pub fn new(projects: Vec<ProjectProfile>) -> Self {
        Self { projects }
    }

    fn matching_listings(&self, filters: &SearchFilters) -> Vec<Listing> {
        let loc = filters.location.as_deref().map(str::to_lowercase);
        let ut = filters.unit_type.as_deref().map(str::to_lowercase);
        self.projects
            .iter()
            .flat_map(|p| p.units.iter().map(move |u| (p, u)))
            .filter(|(p, u)| {
                let location_ok = loc.as_deref().map_or(true, |needle| {
                    p.location
                        .as_deref()
                        .map(str::to_lowercase)
                        .unwrap_or_default()
                        .contains(needle)
                });
                let unit_ok = ut
                    .as_deref()
                    .map_or(true, |needle| u.unit_type.to_lowercase().contains(needle));
                let budget_min_ok =
                    filters.budget_min.map_or(true, |min| u.price.is_some_and(|p| p >= min));
                let budget_max_ok =
                    filters.budget_max.map_or(true, |max| u.price.is_some_and(|p| p <= max));
                let area_min_ok =
                    filters.area_min.map_or(true, |min| u.area.is_some_and(|a| a >= min));
                let area_max_ok =
                    filters.area_max.map_or(true, |max| u.area.is_some_and(|a| a <= max));
                location_ok && unit_ok && budget_min_ok && budget_max_ok && area_min_ok && area_max_ok
            })
            .map(|(p, u)| Listing {
                project_id: p.id,
                project_name: p.name.clone(),
                location: p.location.clone(),
                unit_type: Some(u.unit_type.clone()),
                area: u.area,
                price: u.price,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ListingSearch for InMemoryListingSearch {
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Listing>, RepositoryError> {
        let mut listings = self.matching_listings(filters);
        listings.sort_by(|a, b| {
            let key = |l: &Listing| {
                let price_key = match (filters.budget_max, l.price) {
                    (Some(max), Some(price)) => (price - max).abs() as f64,
                    (None, Some(price)) => price as f64,
                    (_, None) => f64::MAX,
                };
                (price_key, -l.area.unwrap_or(f64::MIN))
            };
            key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
        });
        listings.truncate(filters.limit.max(1) as usize);
        Ok(listings)
    }

    async fn search_similar(
        &self,
        _query_embedding: &[f32],
        filters: &SearchFilters,
        target_area: Option<f64>,
        k: usize,
    ) -> Result<Vec<DiscoveryGroup>, RepositoryError> {
        // No stored vectors here; every filtered row scores zero and the
        // grouping rules still apply.
        let hits = self
            .matching_listings(filters)
            .into_iter()
            .map(|l| {
                (
                    l.project_id,
                    l.project_name,
                    l.location,
                    ScoredUnit { unit_type: l.unit_type, area: l.area, price: l.price, similarity: 0.0 },
                )
            })
            .collect();
        Ok(group_hits(hits, target_area, k))
    }
}
