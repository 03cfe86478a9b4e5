use crate::commands::CommandResult;
use sakan_core::config::{AppConfig, LoadOptions};
use sakan_db::{connect_with_settings, migrations, HashEmbedder, SeedDataset};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
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
                "seed",
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

        SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let embedded = SeedDataset::embed_units(&pool, &HashEmbedder)
            .await
            .map_err(|error| ("seed_embedding", error.to_string(), 5u8))?;

        let verified = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<usize, (&'static str, String, u8)> = if verified {
            Ok(embedded)
        } else {
            Err((
                "seed_verification",
                "seed catalog rows do not match the expected contract".to_string(),
                6u8,
            ))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(embedded) => CommandResult::success(
            "seed",
            format!("seed catalog loaded and verified ({embedded} unit embeddings stored)"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
