use std::collections::HashMap;

use async_trait::async_trait;
use sakan_core::catalog::{DiscoveryGroup, ScoredUnit};
use sakan_core::state::Listing;
use sqlx::Row;

use super::{ListingSearch, RepositoryError, SearchFilters};
use crate::embedding::cosine;
use crate::DbPool;

pub struct SqlListingSearch {
    pool: DbPool,
}

impl SqlListingSearch {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingSearch for SqlListingSearch {
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                 p.id AS project_id,
                 p.project_name,
                 p.area AS location,
                 put.unit_type,
                 put.area AS unit_area,
                 put.price AS unit_price
             FROM project_unit_types put
             JOIN projects p ON p.id = put.project_id
             WHERE
                 (?1 IS NULL OR lower(p.area) LIKE '%' || lower(?1) || '%')
                 AND (?2 IS NULL OR lower(put.unit_type) LIKE '%' || lower(?2) || '%')
                 AND (?3 IS NULL OR put.price >= ?3)
                 AND (?4 IS NULL OR put.price <= ?4)
                 AND (?5 IS NULL OR put.area >= ?5)
                 AND (?6 IS NULL OR put.area <= ?6)
             ORDER BY
                 CASE
                   WHEN ?4 IS NOT NULL THEN ABS(put.price - ?4)
                   ELSE put.price
                 END ASC,
                 put.area DESC
             LIMIT ?7",
        )
        .bind(filters.location.as_deref())
        .bind(filters.unit_type.as_deref())
        .bind(filters.budget_min)
        .bind(filters.budget_max)
        .bind(filters.area_min)
        .bind(filters.area_max)
        .bind(filters.limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Listing {
                project_id: row.get("project_id"),
                project_name: row.get::<Option<String>, _>("project_name").unwrap_or_default(),
                location: row.get("location"),
                unit_type: row.get("unit_type"),
                area: row.get("unit_area"),
                price: row.get("unit_price"),
            })
            .collect())
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        filters: &SearchFilters,
        target_area: Option<f64>,
        k: usize,
    ) -> Result<Vec<DiscoveryGroup>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                 p.id AS project_id,
                 p.project_name,
                 p.area AS location,
                 put.unit_type,
                 put.area AS unit_area,
                 put.price AS unit_price,
                 ue.embedding
             FROM project_unit_types put
             JOIN projects p ON p.id = put.project_id
             JOIN unit_embeddings ue ON ue.unit_type_id = put.id
             WHERE
                 (?1 IS NULL OR lower(p.area) LIKE '%' || lower(?1) || '%')
                 AND (?2 IS NULL OR lower(put.unit_type) LIKE '%' || lower(?2) || '%')
                 AND (?3 IS NULL OR put.price >= ?3)
                 AND (?4 IS NULL OR put.price <= ?4)
                 AND (?5 IS NULL OR put.area >= ?5)
                 AND (?6 IS NULL OR put.area <= ?6)",
        )
        .bind(filters.location.as_deref())
        .bind(filters.unit_type.as_deref())
        .bind(filters.budget_min)
        .bind(filters.budget_max)
        .bind(filters.area_min)
        .bind(filters.area_max)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<(i64, String, Option<String>, ScoredUnit)> = Vec::new();
        for row in rows {
            let raw: String = row.get("embedding");
            let stored: Vec<f32> = serde_json::from_str(&raw)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let similarity = cosine(query_embedding, &stored);
            hits.push((
                row.get("project_id"),
                row.get::<Option<String>, _>("project_name").unwrap_or_default(),
                row.get("location"),
                ScoredUnit {
                    unit_type: row.get("unit_type"),
                    area: row.get("unit_area"),
                    price: row.get("unit_price"),
                    similarity,
                },
            ));
        }

        Ok(group_hits(hits, target_area, k))
    }
}

/// Keeps the top-k hits by similarity, groups them by project, ranks
/// groups by their best similarity, and orders each group by closeness
/// to the target size, then price, then similarity.
pub(crate) fn group_hits(
    mut hits: Vec<(i64, String, Option<String>, ScoredUnit)>,
    target_area: Option<f64>,
    k: usize,
) -> Vec<DiscoveryGroup> {
    hits.sort_by(|a, b| {
        b.3.similarity.partial_cmp(&a.3.similarity).unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k.max(1));

    let mut groups: Vec<DiscoveryGroup> = Vec::new();
    let mut index_by_project: HashMap<i64, usize> = HashMap::new();
    for (project_id, project_name, location, unit) in hits {
        let index = *index_by_project.entry(project_id).or_insert_with(|| {
            groups.push(DiscoveryGroup {
                project_id,
                project_name,
                location,
                units: Vec::new(),
            });
            groups.len() - 1
        });
        groups[index].units.push(unit);
    }

    for group in &mut groups {
        group.units.sort_by(|a, b| {
            let key = |u: &ScoredUnit| {
                let area_dist = match (target_area, u.area) {
                    (Some(target), Some(area)) => (area - target).abs(),
                    _ => f64::MAX,
                };
                let price = u.price.map(|p| p as f64).unwrap_or(f64::MAX);
                (area_dist, price, -u.similarity)
            };
            key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    groups.sort_by(|a, b| {
        let best = |g: &DiscoveryGroup| {
            g.units.iter().map(|u| u.similarity).fold(f64::MIN, f64::max)
        };
        best(b).partial_cmp(&best(a)).unwrap_or(std::cmp::Ordering::Equal)
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(area: Option<f64>, price: Option<i64>, similarity: f64) -> ScoredUnit {
        ScoredUnit { unit_type: Some("Chalet".to_string()), area, price, similarity }
    }

    #[test]
    fn groups_rank_by_best_similarity() {
        let hits = vec![
            (1, "Telal".to_string(), None, unit(Some(120.0), Some(9_800_000), 0.4)),
            (2, "Marassi".to_string(), None, unit(Some(160.0), Some(18_500_000), 0.9)),
            (1, "Telal".to_string(), None, unit(Some(185.0), Some(15_300_000), 0.6)),
        ];
        let groups = group_hits(hits, None, 10);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].project_name, "Marassi");
        assert_eq!(groups[1].units.len(), 2);
    }

    #[test]
    fn within_group_order_prefers_target_size() {
        let hits = vec![
            (1, "Telal".to_string(), None, unit(Some(240.0), Some(22_500_000), 0.9)),
            (1, "Telal".to_string(), None, unit(Some(160.0), Some(15_300_000), 0.5)),
        ];
        let groups = group_hits(hits, Some(150.0), 10);
        assert_eq!(groups[0].units[0].area, Some(160.0));
    }

    #[test]
    fn top_k_truncates_before_grouping() {
        let hits = vec![
            (1, "A".to_string(), None, unit(None, None, 0.9)),
            (2, "B".to_string(), None, unit(None, None, 0.2)),
        ];
        let groups = group_hits(hits, None, 1);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].project_name, "A");
    }
}
