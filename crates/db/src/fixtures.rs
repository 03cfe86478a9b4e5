use sqlx::Executor;

use crate::connection::DbPool;
use crate::embedding::Embedder;
use crate::repositories::RepositoryError;

const SEED_PROJECTS: &[(i64, &str, &str)] = &[
    (1, "Taj City", "New Cairo"),
    (2, "Sarai", "Mostakbal City - New Cairo"),
    (3, "Bloomfields", "Mostakbal City - New Cairo"),
    (4, "Badya", "6th of October"),
    (5, "O West", "6th of October"),
    (6, "Village West", "Sheikh Zayed"),
    (7, "Marassi", "North Coast"),
    (8, "Telal", "North Coast - Sahel"),
];

const SEED_UNIT_COUNT: i64 = 19;

/// Deterministic Egyptian-market catalog for demos and integration tests.
pub struct SeedDataset;

impl SeedDataset {
    /// SQL fixture content for the seed catalog.
    pub const SQL: &'static str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Load the seed catalog. Idempotent: reloading leaves the same rows.
    pub async fn load(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Compute and store an embedding per seeded unit row so the
    /// similarity path has vectors to score against.
    pub async fn embed_units(
        pool: &DbPool,
        embedder: &dyn Embedder,
    ) -> Result<usize, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, Option<String>, Option<f64>, Option<i64>, Option<String>)>(
            "SELECT put.id, put.unit_type, put.area, put.price, p.project_name || '. Location: ' || p.area
             FROM project_unit_types put
             JOIN projects p ON p.id = put.project_id
             ORDER BY put.id",
        )
        .fetch_all(pool)
        .await?;

        let mut embedded = 0usize;
        for (unit_id, unit_type, area, price, project_line) in rows {
            let content = format!(
                "{} in project {}. Area: {} sqm. Price: {} EGP.",
                unit_type.as_deref().unwrap_or("Unit"),
                project_line.as_deref().unwrap_or("Unknown"),
                area.map(|a| format!("{a:.0}")).unwrap_or_else(|| "N/A".to_string()),
                price.map(|p| p.to_string()).unwrap_or_else(|| "N/A".to_string()),
            );
            let vector = embedder.embed(&content);
            let encoded = serde_json::to_string(&vector)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            sqlx::query(
                "INSERT OR REPLACE INTO unit_embeddings (unit_type_id, embedding) VALUES (?1, ?2)",
            )
            .bind(unit_id)
            .bind(encoded)
            .execute(pool)
            .await?;
            embedded += 1;
        }
        Ok(embedded)
    }

    /// Verify that seeded rows exist and match the contract.
    pub async fn verify(pool: &DbPool) -> Result<bool, RepositoryError> {
        for (id, name, location) in SEED_PROJECTS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1 AND project_name = ?2 AND area = ?3)",
            )
            .bind(id)
            .bind(name)
            .bind(location)
            .fetch_one(pool)
            .await?;
            if exists != 1 {
                return Ok(false);
            }
        }

        let unit_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM project_unit_types WHERE project_id IS NOT NULL",
        )
        .fetch_one(pool)
        .await?;
        Ok(unit_count == SEED_UNIT_COUNT)
    }

    /// Remove the seeded catalog from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let ids =
            SEED_PROJECTS.iter().map(|(id, _, _)| id.to_string()).collect::<Vec<_>>().join(",");
        let mut tx = pool.begin().await?;
        sqlx::query(&format!(
            "DELETE FROM unit_embeddings WHERE unit_type_id IN
             (SELECT id FROM project_unit_types WHERE project_id IN ({ids}))"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM project_unit_types WHERE project_id IN ({ids})"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM projects WHERE id IN ({ids})"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!SeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn seed_loads_verifies_and_reloads_idempotently() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        SeedDataset::load(&pool).await.expect("load seed fixtures");
        assert!(SeedDataset::verify(&pool).await.expect("verify seed fixtures"));

        SeedDataset::load(&pool).await.expect("reload seed fixtures");
        assert!(SeedDataset::verify(&pool).await.expect("re-verify seed fixtures"));
    }

    #[tokio::test]
    async fn embed_units_covers_every_seeded_row() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        let embedded =
            SeedDataset::embed_units(&pool, &HashEmbedder).await.expect("embed units");
        assert_eq!(embedded as i64, SEED_UNIT_COUNT);

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM unit_embeddings")
            .fetch_one(&pool)
            .await
            .expect("count embeddings");
        assert_eq!(stored, SEED_UNIT_COUNT);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        SeedDataset::clean(&pool).await.expect("clean seed fixtures");
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM projects")
            .fetch_one(&pool)
            .await
            .expect("count projects");
        assert_eq!(remaining, 0);
    }
}
