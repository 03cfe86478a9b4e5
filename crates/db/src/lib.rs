pub mod connection;
pub mod embedding;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use embedding::{Embedder, HashEmbedder, EMBEDDING_DIM};
pub use fixtures::SeedDataset;
pub use repositories::{
    ConversationStore, ListingSearch, ProjectDirectory, RepositoryError, SearchFilters,
    SqlConversationStore, SqlListingSearch, SqlProjectDirectory, StoredMessage,
};
