//! Brute-force vector similarity search over stored embedding BLOBs.

use std::time::Instant;

use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use protoq_core::models::{SearchFilter, SearchHit, SearchSource, SectionType};
use protoq_core::{cosine_similarity, decode_embedding, Result};

use crate::fts::{bind_filter, push_filter_clauses};

/// Cosine-similarity search that scores every candidate row in process.
///
/// Linear in the number of stored embeddings. Fine for corpus sizes in the
/// hundreds of documents; an ANN index would be the next step beyond that.
#[derive(Debug, Clone)]
pub struct VectorSearch {
    pool: SqlitePool,
}

impl VectorSearch {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Rank chunks by cosine similarity to `query_embedding`.
    ///
    /// Rows whose stored embedding cannot be decoded or has a different
    /// dimension score 0 and are logged; the scan continues.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        limit: i64,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let start = Instant::now();

        let mut sql = String::from(
            r#"
            SELECT
                c.id AS chunk_id,
                c.document_id,
                d.protocol_id,
                c.chunk_text,
                s.section_type,
                e.embedding
            FROM embeddings e
            JOIN chunks c ON c.id = e.chunk_id
            JOIN documents d ON d.id = c.document_id
            LEFT JOIN sections s ON s.id = c.section_id
            WHERE 1=1
            "#,
        );
        push_filter_clauses(&mut sql, filter);
        sql.push_str(" ORDER BY c.id");

        let q = bind_filter(sqlx::query(&sql), filter);
        let rows = q.fetch_all(&self.pool).await?;
        let candidates = rows.len();

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk_id: i64 = row.try_get("chunk_id")?;
            let blob: Vec<u8> = row.try_get("embedding")?;

            let score = match decode_embedding(&blob) {
                Some(stored) if stored.len() == query_embedding.len() => {
                    cosine_similarity(query_embedding, &stored) as f64
                }
                Some(stored) => {
                    warn!(
                        subsystem = "search",
                        component = "vector",
                        chunk_id = chunk_id,
                        stored_dimension = stored.len(),
                        query_dimension = query_embedding.len(),
                        "Embedding dimension mismatch, scoring 0"
                    );
                    0.0
                }
                None => {
                    warn!(
                        subsystem = "search",
                        component = "vector",
                        chunk_id = chunk_id,
                        blob_len = blob.len(),
                        "Malformed embedding blob, scoring 0"
                    );
                    0.0
                }
            };

            let section_type: Option<String> = row.try_get("section_type")?;
            hits.push(SearchHit {
                chunk_id,
                document_id: row.try_get("document_id")?,
                protocol_id: row.try_get("protocol_id")?,
                chunk_text: row.try_get("chunk_text")?,
                section_type: section_type.and_then(|s| s.parse::<SectionType>().ok()),
                score,
                source: SearchSource::Semantic,
            });
        }

        // Stable sort keeps candidate (chunk id) order among equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit.max(0) as usize);

        debug!(
            subsystem = "search",
            component = "vector",
            op = "search",
            candidates = candidates,
            hits = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Vector search complete"
        );
        Ok(hits)
    }
}
