use async_trait::async_trait;
use thiserror::Error;

use sakan_core::catalog::{DiscoveryGroup, ProjectProfile};
use sakan_core::state::{ConversationId, ConversationState, Listing, StatePatch};

pub mod conversation;
pub mod listing;
pub mod memory;
pub mod project;

pub use conversation::SqlConversationStore;
pub use listing::SqlListingSearch;
pub use memory::{InMemoryConversationStore, InMemoryListingSearch, InMemoryProjectDirectory};
pub use project::SqlProjectDirectory;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// One persisted transcript line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub intent: Option<String>,
    pub created_at: String,
}

/// Structured filters for both retrieval paths. Location and unit type
/// are substring matches; the bounds are numeric comparisons.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchFilters {
    pub location: Option<String>,
    pub unit_type: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub area_min: Option<f64>,
    pub area_max: Option<f64>,
    pub limit: i64,
}

impl SearchFilters {
    pub fn with_limit(limit: i64) -> Self {
        Self { limit, ..Self::default() }
    }
}

/// Conversation state blob plus transcript persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &ConversationId)
        -> Result<Option<ConversationState>, RepositoryError>;

    /// Creates the conversation with default state; keeps existing state
    /// when the row is already there.
    async fn create(&self, id: &ConversationId) -> Result<ConversationState, RepositoryError>;

    /// Atomic read-merge-write of the state document. The patch lands in
    /// full or not at all; the merged state is returned.
    async fn merge(
        &self,
        id: &ConversationId,
        patch: &StatePatch,
    ) -> Result<ConversationState, RepositoryError>;

    async fn append_message(
        &self,
        id: &ConversationId,
        role: &str,
        content: &str,
        intent: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Most recent messages in chronological order.
    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;
}

/// Project lookup by id or fuzzy name, with units attached.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn project_with_units(&self, id: i64)
        -> Result<Option<ProjectProfile>, RepositoryError>;

    /// Profiles in the order of `ids`; unknown ids are skipped.
    async fn projects_with_units(
        &self,
        ids: &[i64],
    ) -> Result<Vec<ProjectProfile>, RepositoryError>;

    /// Contains-filtered name search scored 3/2/1 for exact/prefix/partial,
    /// ties broken by normalized name. Returns `(profile, score)` so the
    /// caller can spot equally-ranked same-name matches.
    async fn search_ranked(
        &self,
        name: &str,
        limit: i64,
    ) -> Result<Vec<(ProjectProfile, u8)>, RepositoryError>;

    /// Cheapest unit price under the location/unit-type filters, for the
    /// no-result hint.
    async fn min_price(
        &self,
        location: &str,
        unit_type: &str,
    ) -> Result<Option<i64>, RepositoryError>;
}

/// Ranked retrieval over the unit inventory.
#[async_trait]
pub trait ListingSearch: Send + Sync {
    /// Filtered query ranked by distance from the budget ceiling (plain
    /// price when no ceiling is set), then by area descending.
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Listing>, RepositoryError>;

    /// Similarity variant: structured filters in SQL, cosine scoring over
    /// stored embeddings in-process, grouped by project. Groups are ranked
    /// by best similarity; within a group units sort by closeness to
    /// `target_area`, then price, then similarity.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        filters: &SearchFilters,
        target_area: Option<f64>,
        k: usize,
    ) -> Result<Vec<DiscoveryGroup>, RepositoryError>;
}
