use async_trait::async_trait;
use chrono::Utc;
use sakan_core::state::{ConversationId, ConversationState, StatePatch};
use sqlx::Row;

use super::{ConversationStore, RepositoryError, StoredMessage};
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_state(raw: &str) -> Result<ConversationState, RepositoryError> {
    serde_json::from_str(raw).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn encode_state(state: &ConversationState) -> Result<String, RepositoryError> {
    serde_json::to_string(state).map_err(|error| RepositoryError::Decode(error.to_string()))
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    async fn get(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        let row = sqlx::query("SELECT state FROM conversations WHERE id = ?1")
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| decode_state(&r.get::<String, _>("state"))).transpose()
    }

    async fn create(&self, id: &ConversationId) -> Result<ConversationState, RepositoryError> {
        let state = ConversationState::default();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO conversations (id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id.0.to_string())
        .bind(encode_state(&state)?)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        // The row may have existed already; return what is stored.
        match self.get(id).await? {
            Some(existing) => Ok(existing),
            None => Ok(state),
        }
    }

    async fn merge(
        &self,
        id: &ConversationId,
        patch: &StatePatch,
    ) -> Result<ConversationState, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT state FROM conversations WHERE id = ?1")
            .bind(id.0.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let mut state = match row {
            Some(r) => decode_state(&r.get::<String, _>("state"))?,
            None => ConversationState::default(),
        };
        state.apply(patch);

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO conversations (id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT (id) DO UPDATE SET state = excluded.state, updated_at = ?3",
        )
        .bind(id.0.to_string())
        .bind(encode_state(&state)?)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(state)
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        role: &str,
        content: &str,
        intent: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, intent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.0.to_string())
        .bind(role)
        .bind(content)
        .bind(intent)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, content, intent, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )
        .bind(id.0.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<StoredMessage> = rows
            .into_iter()
            .map(|r| StoredMessage {
                role: r.get("role"),
                content: r.get("content"),
                intent: r.get("intent"),
                created_at: r.get("created_at"),
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }
}
