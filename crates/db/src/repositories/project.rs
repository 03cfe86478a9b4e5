use std::collections::HashMap;

use async_trait::async_trait;
use sakan_core::catalog::{ProjectProfile, UnitOffering};
use sakan_core::text::normalize;
use sqlx::Row;

use super::{ProjectDirectory, RepositoryError};
use crate::DbPool;

pub struct SqlProjectDirectory {
    pool: DbPool,
}

impl SqlProjectDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_profiles(&self, ids: &[i64]) -> Result<Vec<ProjectProfile>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders =
            (1..=ids.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");

        let project_sql =
            format!("SELECT id, project_name, area FROM projects WHERE id IN ({placeholders})");
        let unit_sql = format!(
            "SELECT project_id, unit_type, area, price
             FROM project_unit_types
             WHERE project_id IN ({placeholders})
             ORDER BY id"
        );
        let mut project_query = sqlx::query(&project_sql);
        let mut unit_query = sqlx::query(&unit_sql);
        for id in ids {
            project_query = project_query.bind(id);
            unit_query = unit_query.bind(id);
        }

        let project_rows = project_query.fetch_all(&self.pool).await?;
        let unit_rows = unit_query.fetch_all(&self.pool).await?;

        let mut units_by_project: HashMap<i64, Vec<UnitOffering>> = HashMap::new();
        for row in unit_rows {
            let project_id: Option<i64> = row.get("project_id");
            let Some(project_id) = project_id else { continue };
            units_by_project.entry(project_id).or_default().push(UnitOffering {
                unit_type: row.get::<Option<String>, _>("unit_type").unwrap_or_default(),
                area: row.get("area"),
                price: row.get("price"),
                bedrooms: None,
            });
        }

        let mut by_id: HashMap<i64, ProjectProfile> = HashMap::new();
        for row in project_rows {
            let id: i64 = row.get("id");
            by_id.insert(
                id,
                ProjectProfile {
                    id,
                    name: row.get::<Option<String>, _>("project_name").unwrap_or_default(),
                    location: row.get("area"),
                    developer: None,
                    units: units_by_project.remove(&id).unwrap_or_default(),
                },
            );
        }

        // Preserve the caller's id order, skipping unknown ids and dupes.
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = by_id.remove(id) {
                out.push(profile);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ProjectDirectory for SqlProjectDirectory {
    async fn project_with_units(
        &self,
        id: i64,
    ) -> Result<Option<ProjectProfile>, RepositoryError> {
        Ok(self.load_profiles(&[id]).await?.into_iter().next())
    }

    async fn projects_with_units(
        &self,
        ids: &[i64],
    ) -> Result<Vec<ProjectProfile>, RepositoryError> {
        self.load_profiles(ids).await
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

        let rows = sqlx::query(
            "SELECT id, project_name FROM projects
             WHERE project_name IS NOT NULL
               AND lower(project_name) LIKE '%' || ?1 || '%'
             LIMIT ?2",
        )
        .bind(&needle)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(i64, String, u8)> = rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let project_name: String = row.get("project_name");
                let lowered = project_name.to_lowercase();
                let score = if lowered == needle {
                    3
                } else if lowered.starts_with(&needle) {
                    2
                } else {
                    1
                };
                (id, project_name, score)
            })
            .collect();
        scored.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| normalize(&a.1).cmp(&normalize(&b.1))));

        let ordered_ids: Vec<i64> = scored.iter().map(|(id, _, _)| *id).collect();
        let profiles = self.load_profiles(&ordered_ids).await?;

        let score_by_id: HashMap<i64, u8> =
            scored.into_iter().map(|(id, _, score)| (id, score)).collect();
        Ok(profiles
            .into_iter()
            .map(|profile| {
                let score = score_by_id.get(&profile.id).copied().unwrap_or(1);
                (profile, score)
            })
            .collect())
    }

    async fn min_price(
        &self,
        location: &str,
        unit_type: &str,
    ) -> Result<Option<i64>, RepositoryError> {
        let min_price: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(put.price)
             FROM projects p
             JOIN project_unit_types put ON put.project_id = p.id
             WHERE lower(p.area) LIKE '%' || lower(?1) || '%'
               AND lower(put.unit_type) LIKE '%' || lower(?2) || '%'",
        )
        .bind(location)
        .bind(unit_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(min_price)
    }
}
