use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use sakan_agent::classifier::{FallbackClassifier, NoopClassifier};
use sakan_agent::orchestrator::Orchestrator;
use sakan_core::config::{AppConfig, ConfigError, LoadOptions};
use sakan_db::repositories::{SqlConversationStore, SqlListingSearch, SqlProjectDirectory};
use sakan_db::{connect_with_settings, migrations, DbPool, HashEmbedder};

use crate::fallback::OllamaClassifier;
use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("classifier client construction failed: {0}")]
    Classifier(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let fallback: Arc<dyn FallbackClassifier> = if config.classifier.enabled {
        Arc::new(OllamaClassifier::new(&config.classifier).map_err(BootstrapError::Classifier)?)
    } else {
        Arc::new(NoopClassifier)
    };

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(SqlConversationStore::new(db_pool.clone())),
        Arc::new(SqlProjectDirectory::new(db_pool.clone())),
        Arc::new(SqlListingSearch::new(db_pool.clone())),
        fallback,
        Duration::from_secs(config.classifier.timeout_secs),
    ));

    Ok(Application { config, db_pool, orchestrator })
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState {
            orchestrator: Arc::clone(&self.orchestrator),
            listings: Arc::new(SqlListingSearch::new(self.db_pool.clone())),
            embedder: Arc::new(HashEmbedder),
        }
    }
}

#[cfg(test)]
mod tests {
    use sakan_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                classifier_enabled: Some(false),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_migrates_the_conversation_schema() {
        let app = bootstrap(memory_options()).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('projects', 'project_unit_types', 'conversations', 'messages', 'unit_embeddings')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables after bootstrap");
        assert_eq!(table_count, 5, "bootstrap should expose the conversation-path tables");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_a_non_sqlite_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://nope".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = match result {
            Ok(_) => panic!("expected config validation to fail"),
            Err(error) => error.to_string(),
        };
        assert!(message.contains("database.url"));
    }
}
