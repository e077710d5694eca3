//! Cross-protocol eligibility criteria matching.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;
use tracing::info;

use protoq_core::models::{
    CriteriaComparison, CriterionPair, CriterionType, EligibilityCriterion, MatchedCriterion,
};
use protoq_core::{cosine_similarity, defaults, EmbeddingProvider, Result};
use protoq_db::{CriteriaRepository, DocumentRepository};

/// Semantic matcher over eligibility criteria of multiple protocols.
pub struct CriteriaMatcher {
    documents: DocumentRepository,
    criteria: CriteriaRepository,
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl CriteriaMatcher {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            documents: DocumentRepository::new(pool.clone()),
            criteria: CriteriaRepository::new(pool),
            embedder,
            threshold: defaults::SIMILARITY_THRESHOLD,
        }
    }

    /// Override the similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Compare criteria across the named protocols.
    ///
    /// Protocols with no indexed document are skipped. All criteria are
    /// embedded in one batch, then scanned pairwise; only pairs from
    /// different protocols can match. Each criterion, on either side of a
    /// pair, joins at most one reported pair per partner protocol, so
    /// near-duplicate criteria inside one document do not multiply the pair
    /// list. Criteria matching nothing anywhere are reported per protocol as
    /// unique.
    pub async fn compare_criteria(
        &self,
        protocol_ids: &[String],
        criterion_type: Option<CriterionType>,
    ) -> Result<CriteriaComparison> {
        let start = Instant::now();

        let mut criteria_by_protocol: Vec<(String, Vec<EligibilityCriterion>)> = Vec::new();
        for protocol_id in protocol_ids {
            if let Some(doc) = self.documents.find_by_protocol_id(protocol_id).await? {
                let criteria = self.criteria.list(doc.id, criterion_type).await?;
                criteria_by_protocol.push((protocol_id.clone(), criteria));
            }
        }

        // (protocol, criterion) pool in deterministic request order.
        let pool: Vec<(&str, &EligibilityCriterion)> = criteria_by_protocol
            .iter()
            .flat_map(|(pid, criteria)| criteria.iter().map(move |c| (pid.as_str(), c)))
            .collect();

        let mut comparison = CriteriaComparison {
            protocols: protocol_ids.to_vec(),
            ..Default::default()
        };

        if pool.is_empty() {
            comparison.criteria_by_protocol = criteria_by_protocol;
            return Ok(comparison);
        }

        let texts: Vec<String> = pool.iter().map(|(_, c)| c.criterion_text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        // Candidate pairs at or above the threshold, in upper-triangle
        // encounter order.
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
        for i in 0..pool.len() {
            for j in (i + 1)..pool.len() {
                if pool[i].0 == pool[j].0 {
                    continue;
                }
                let similarity = cosine_similarity(&embeddings[i], &embeddings[j]);
                if similarity >= self.threshold {
                    candidates.push((i, j, similarity));
                }
            }
        }

        // Greedy best-first assignment. Both sides of an emitted pair are
        // consumed for the partner protocol, so a criterion appears in at
        // most one reported pair per partner document. Stable sort keeps
        // encounter order among equal similarities.
        candidates
            .sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut consumed: HashSet<(i64, &str)> = HashSet::new();
        let mut matched: HashSet<(i64, &str)> = HashSet::new();
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (i, j, similarity) in candidates {
            let left_key = (pool[i].1.id, pool[j].0);
            let right_key = (pool[j].1.id, pool[i].0);
            if consumed.contains(&left_key) || consumed.contains(&right_key) {
                continue;
            }
            consumed.insert(left_key);
            consumed.insert(right_key);
            matched.insert((pool[i].1.id, pool[i].0));
            matched.insert((pool[j].1.id, pool[j].0));
            pairs.push((i, j, similarity));
        }

        // Report in upper-triangle encounter order.
        pairs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        for (i, j, similarity) in pairs {
            comparison.similar_criteria.push(CriterionPair {
                left: MatchedCriterion {
                    protocol_id: pool[i].0.to_string(),
                    criterion: pool[i].1.clone(),
                },
                right: MatchedCriterion {
                    protocol_id: pool[j].0.to_string(),
                    criterion: pool[j].1.clone(),
                },
                similarity,
            });
        }

        for (protocol_id, criteria) in &criteria_by_protocol {
            let unique: Vec<EligibilityCriterion> = criteria
                .iter()
                .filter(|c| !matched.contains(&(c.id, protocol_id.as_str())))
                .cloned()
                .collect();
            comparison
                .unique_criteria
                .push((protocol_id.clone(), unique));
        }
        comparison.criteria_by_protocol = criteria_by_protocol;

        info!(
            subsystem = "search",
            component = "matcher",
            op = "compare_criteria",
            protocols = comparison.protocols.len(),
            pairs = comparison.similar_criteria.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Criteria comparison complete"
        );
        Ok(comparison)
    }
}
