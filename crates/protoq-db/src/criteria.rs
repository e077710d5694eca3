//! Eligibility criteria repository.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use protoq_core::models::{CriterionCategory, CriterionType, EligibilityCriterion};
use protoq_core::{Error, Result};

/// Repository for criteria derived from criterion chunks at ingest time.
#[derive(Debug, Clone)]
pub struct CriteriaRepository {
    pool: SqlitePool,
}

impl CriteriaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Criteria of a document, optionally restricted to one type.
    ///
    /// Ordered by type then criterion number, matching the enumeration order
    /// in the source section.
    pub async fn list(
        &self,
        document_id: i64,
        criterion_type: Option<CriterionType>,
    ) -> Result<Vec<EligibilityCriterion>> {
        let rows = match criterion_type {
            Some(ct) => {
                sqlx::query(
                    "SELECT * FROM eligibility_criteria
                     WHERE document_id = ? AND criterion_type = ?
                     ORDER BY criterion_number",
                )
                .bind(document_id)
                .bind(ct.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM eligibility_criteria
                     WHERE document_id = ?
                     ORDER BY criterion_type, criterion_number",
                )
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(map_criterion).collect()
    }

    /// Criterion counts per type for a document.
    pub async fn counts_by_type(&self, document_id: i64) -> Result<HashMap<CriterionType, i64>> {
        let rows = sqlx::query(
            "SELECT criterion_type, COUNT(*) AS count
             FROM eligibility_criteria
             WHERE document_id = ?
             GROUP BY criterion_type",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let tag: String = row.try_get("criterion_type")?;
            let criterion_type = CriterionType::from_str(&tag).map_err(Error::Serialization)?;
            counts.insert(criterion_type, row.try_get("count")?);
        }
        Ok(counts)
    }
}

fn map_criterion(row: &SqliteRow) -> Result<EligibilityCriterion> {
    let criterion_type: String = row.try_get("criterion_type")?;
    let category: Option<String> = row.try_get("category")?;
    Ok(EligibilityCriterion {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        criterion_type: CriterionType::from_str(&criterion_type).map_err(Error::Serialization)?,
        criterion_number: row
            .try_get::<Option<i64>, _>("criterion_number")?
            .unwrap_or(0),
        criterion_text: row.try_get("criterion_text")?,
        category: category
            .map(|c| CriterionCategory::from_str(&c).map_err(Error::Serialization))
            .transpose()?,
        chunk_id: row.try_get("chunk_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentRepository;
    use crate::pool::{create_pool_from_url, PoolConfig};
    use crate::schema;
    use protoq_core::models::{ChunkKind, ChunkRecord, ParsedDocument};

    async fn seeded() -> (CriteriaRepository, i64) {
        let pool = create_pool_from_url("sqlite::memory:", PoolConfig::default())
            .await
            .unwrap();
        schema::initialize(&pool).await.unwrap();

        let docs = DocumentRepository::new(pool.clone());
        let chunks = vec![
            criterion_chunk("Age 18 years or older", CriterionType::Inclusion, 1),
            criterion_chunk("ECOG performance status 0-1", CriterionType::Inclusion, 2),
            criterion_chunk("Pregnant or nursing", CriterionType::Exclusion, 1),
        ];
        let embeddings = vec![vec![1.0, 0.0]; chunks.len()];
        let doc = ParsedDocument {
            filename: "p.pdf".to_string(),
            filepath: "/data/p.pdf".to_string(),
            file_type: "pdf".to_string(),
            protocol_id: Some("P-001".to_string()),
            ..Default::default()
        };
        let id = docs.ingest(&doc, &chunks, &embeddings, false).await.unwrap();
        (CriteriaRepository::new(pool), id)
    }

    fn criterion_chunk(text: &str, criterion_type: CriterionType, number: i64) -> ChunkRecord {
        ChunkRecord {
            chunk_text: text.to_string(),
            chunk_kind: ChunkKind::Criterion,
            section_index: None,
            page_number: None,
            criterion_type: Some(criterion_type),
            criterion_number: Some(number),
            category: None,
        }
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_type_then_number() {
        let (repo, doc_id) = seeded().await;
        let criteria = repo.list(doc_id, None).await.unwrap();

        assert_eq!(criteria.len(), 3);
        assert_eq!(criteria[0].criterion_type, CriterionType::Exclusion);
        assert_eq!(criteria[1].criterion_type, CriterionType::Inclusion);
        assert_eq!(criteria[1].criterion_number, 1);
        assert_eq!(criteria[2].criterion_number, 2);
    }

    #[tokio::test]
    async fn test_list_filtered_by_type() {
        let (repo, doc_id) = seeded().await;
        let inclusion = repo
            .list(doc_id, Some(CriterionType::Inclusion))
            .await
            .unwrap();

        assert_eq!(inclusion.len(), 2);
        assert!(inclusion
            .iter()
            .all(|c| c.criterion_type == CriterionType::Inclusion));
    }

    #[tokio::test]
    async fn test_counts_by_type() {
        let (repo, doc_id) = seeded().await;
        let counts = repo.counts_by_type(doc_id).await.unwrap();

        assert_eq!(counts.get(&CriterionType::Inclusion), Some(&2));
        assert_eq!(counts.get(&CriterionType::Exclusion), Some(&1));
    }

    #[tokio::test]
    async fn test_unknown_document_yields_empty() {
        let (repo, _) = seeded().await;
        assert!(repo.list(9999, None).await.unwrap().is_empty());
        assert!(repo.counts_by_type(9999).await.unwrap().is_empty());
    }
}
