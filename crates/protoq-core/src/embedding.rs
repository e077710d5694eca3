//! Embedding provider abstraction.
//!
//! The embedding model is an external collaborator: protoq consumes it as a
//! black-box function from text to a fixed-length vector. Components that
//! need embeddings (ingest, vector search, criteria matching) receive a
//! provider at construction time.

use async_trait::async_trait;

use crate::error::Result;

/// A source of text embeddings with a fixed output dimension.
///
/// Both methods must be deterministic for a fixed model configuration:
/// embedding the same text twice yields the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// The dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;
}
