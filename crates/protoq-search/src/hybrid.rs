//! Search engine front door: mode dispatch and hybrid fusion.

use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;
use tracing::info;

use protoq_core::models::{SearchFilter, SearchHit, SearchMode};
use protoq_core::{defaults, EmbeddingProvider, Result};

use crate::fts::FtsSearch;
use crate::rrf;
use crate::vector::VectorSearch;

/// Hybrid search engine.
///
/// Lexical mode needs no embedding call; semantic and hybrid modes embed the
/// query once through the injected provider.
pub struct SearchEngine {
    fts: FtsSearch,
    vector: VectorSearch,
    embedder: Arc<dyn EmbeddingProvider>,
    rrf_k: f64,
}

impl SearchEngine {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            fts: FtsSearch::new(pool.clone()),
            vector: VectorSearch::new(pool),
            embedder,
            rrf_k: defaults::RRF_K,
        }
    }

    /// Override the RRF ranking constant.
    pub fn with_rrf_k(mut self, k: f64) -> Self {
        self.rrf_k = k;
        self
    }

    /// Run a search in the requested mode.
    ///
    /// Hybrid mode fetches `3 x limit` candidates from each source so fusion
    /// has enough overlap to work with, then trims to `limit`.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: i64,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>> {
        let start = Instant::now();

        let hits = match mode {
            SearchMode::Lexical => self.fts.search(query, limit, filter).await?,
            SearchMode::Semantic => {
                let query_embedding = self.embedder.embed(query).await?;
                self.vector.search(&query_embedding, limit, filter).await?
            }
            SearchMode::Hybrid => {
                let fetch_limit = limit.saturating_mul(defaults::FUSION_FETCH_MULTIPLIER);
                let lexical = self.fts.search(query, fetch_limit, filter).await?;
                let query_embedding = self.embedder.embed(query).await?;
                let semantic = self.vector.search(&query_embedding, fetch_limit, filter).await?;
                rrf::fuse(lexical, semantic, self.rrf_k, limit.max(0) as usize)
            }
        };

        info!(
            subsystem = "search",
            component = "engine",
            op = "search",
            mode = ?mode,
            hits = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(hits)
    }
}
