use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::commands::CommandResult;
use sakan_agent::classifier::NoopClassifier;
use sakan_agent::orchestrator::{Orchestrator, TurnRequest};
use sakan_core::config::{AppConfig, LoadOptions};
use sakan_db::repositories::{SqlConversationStore, SqlListingSearch, SqlProjectDirectory};
use sakan_db::{connect_with_settings, migrations, HashEmbedder, SeedDataset};

/// Interactive loop against the configured database. Runs without the
/// network classifier, so routing is rules-only.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        // An empty catalog makes every search come back blank. Loading the
        // seed catalog is idempotent, so it is safe on every start.
        SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        SeedDataset::embed_units(&pool, &HashEmbedder)
            .await
            .map_err(|error| ("seed_embedding", error.to_string(), 5u8))?;

        let orchestrator = Orchestrator::new(
            Arc::new(SqlConversationStore::new(pool.clone())),
            Arc::new(SqlProjectDirectory::new(pool.clone())),
            Arc::new(SqlListingSearch::new(pool.clone())),
            Arc::new(NoopClassifier),
            Duration::from_secs(config.classifier.timeout_secs),
        );

        let turns = chat_loop(&orchestrator).await.map_err(|error| ("io", error, 3u8))?;

        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(turns)
    });

    match result {
        Ok(turns) => CommandResult::success("chat", format!("session ended after {turns} turns")),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

async fn chat_loop(orchestrator: &Orchestrator) -> Result<usize, String> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut conversation_id = None;
    let mut turns = 0usize;

    println!("sakan chat (rules-only). Type `exit` to leave.");
    loop {
        print!("you> ");
        stdout.flush().map_err(|error| error.to_string())?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|error| error.to_string())?;
        if read == 0 {
            break;
        }
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        let response = orchestrator
            .handle_turn(TurnRequest { conversation_id, message: message.to_string() })
            .await;
        conversation_id = Some(response.conversation_id);
        turns += 1;
        println!("sakan> {}", response.reply);
    }

    Ok(turns)
}
