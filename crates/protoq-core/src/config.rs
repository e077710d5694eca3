//! Configuration for the protoq system.
//!
//! All components receive configuration values explicitly at construction;
//! there is no ambient global state.

use std::path::PathBuf;

use crate::defaults;
use crate::error::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Name of the embedding model (informational; the provider is injected).
    pub embedding_model: String,
    /// Embedding vector dimension. Constant across the whole store.
    pub embedding_dimension: usize,
    /// Target chunk size in approximate tokens.
    pub chunk_size: usize,
    /// Overlap budget in approximate tokens between adjacent narrative chunks.
    pub chunk_overlap: usize,
    /// Default maximum number of search results.
    pub result_limit: i64,
    /// RRF ranking constant.
    pub rrf_k: f64,
    /// Cosine similarity threshold for criteria matching.
    pub similarity_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/protocols.db"),
            embedding_model: defaults::EMBED_MODEL.to_string(),
            embedding_dimension: defaults::EMBED_DIMENSION,
            chunk_size: defaults::CHUNK_SIZE_TOKENS,
            chunk_overlap: defaults::CHUNK_OVERLAP_TOKENS,
            result_limit: defaults::RESULT_LIMIT,
            rrf_k: defaults::RRF_K,
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `PROTOQ_DB_PATH`, `PROTOQ_EMBEDDING_MODEL`,
    /// `PROTOQ_EMBEDDING_DIMENSION`, `PROTOQ_CHUNK_SIZE`,
    /// `PROTOQ_CHUNK_OVERLAP`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PROTOQ_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(model) = std::env::var("PROTOQ_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(dim) = std::env::var("PROTOQ_EMBEDDING_DIMENSION") {
            config.embedding_dimension = dim
                .parse()
                .map_err(|_| Error::Config(format!("invalid embedding dimension: {dim}")))?;
        }
        if let Ok(size) = std::env::var("PROTOQ_CHUNK_SIZE") {
            config.chunk_size = size
                .parse()
                .map_err(|_| Error::Config(format!("invalid chunk size: {size}")))?;
        }
        if let Ok(overlap) = std::env::var("PROTOQ_CHUNK_OVERLAP") {
            config.chunk_overlap = overlap
                .parse()
                .map_err(|_| Error::Config(format!("invalid chunk overlap: {overlap}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that the store relies on. Called once at store
    /// initialization; configuration errors are fatal.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(Error::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(
                "chunk overlap must be smaller than chunk size".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Set the embedding dimension.
    pub fn with_embedding_dimension(mut self, dim: usize) -> Self {
        self.embedding_dimension = dim;
        self
    }

    /// Set chunking parameters.
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }
}
