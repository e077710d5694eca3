//! # protoq-db
//!
//! SQLite storage layer for protoq.
//!
//! This crate provides:
//! - Connection pool management (WAL, foreign keys)
//! - Idempotent schema creation with an FTS5 mirror of chunk text
//! - Protocol-aware document segmentation
//! - Repositories for documents and eligibility criteria
//!
//! ## Example
//!
//! ```rust,ignore
//! use protoq_db::{Database, ProtocolChunker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open(std::path::Path::new("protocols.db")).await?;
//!
//!     let chunks = ProtocolChunker::default().chunk_document(&doc);
//!     let doc_id = db.documents.ingest(&doc, &chunks, &embeddings, false).await?;
//!     println!("Ingested document {doc_id}");
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod criteria;
pub mod documents;
pub mod pool;
pub mod schema;

pub use chunking::{categorize_criterion, ProtocolChunker};
pub use criteria::CriteriaRepository;
pub use documents::{hash_content, DocumentRepository};
pub use pool::{create_pool, create_pool_from_url, create_pool_with_config, PoolConfig};

// Re-export core types
pub use protoq_core::*;

use sqlx::SqlitePool;
use std::path::Path;

/// Handle bundling the pool and repositories.
#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
    pub documents: DocumentRepository,
    pub criteria: CriteriaRepository,
}

impl Database {
    /// Open the database file (creating it if missing) and apply the schema.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = pool::create_pool(db_path).await?;
        Self::from_pool(pool).await
    }

    /// Open using an application [`Config`]: validates it, opens its
    /// `db_path`, and enforces the configured embedding dimension on ingest.
    pub async fn open_with_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let pool = pool::create_pool(&config.db_path).await?;
        schema::initialize(&pool).await?;
        Ok(Self {
            documents: DocumentRepository::new(pool.clone())
                .with_expected_dimension(config.embedding_dimension),
            criteria: CriteriaRepository::new(pool.clone()),
            pool,
        })
    }

    /// Open from a SQLite URL such as `sqlite::memory:`.
    pub async fn open_url(database_url: &str) -> Result<Self> {
        let pool = pool::create_pool_from_url(database_url, PoolConfig::default()).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying the schema.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        schema::initialize(&pool).await?;
        Ok(Self {
            documents: DocumentRepository::new(pool.clone()),
            criteria: CriteriaRepository::new(pool.clone()),
            pool,
        })
    }

    /// Rebuild the FTS index from the chunks table.
    pub async fn rebuild_fts(&self) -> Result<()> {
        schema::rebuild_fts(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_url("sqlite::memory:").await.unwrap();
        assert!(db.documents.list().await.unwrap().is_empty());
        db.rebuild_fts().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_with_config_validates() {
        let config = Config::default().with_embedding_dimension(0);
        assert!(Database::open_with_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_open_with_config_enforces_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default()
            .with_db_path(dir.path().join("protocols.db"))
            .with_embedding_dimension(4);
        let db = Database::open_with_config(&config).await.unwrap();

        let doc = protoq_core::models::ParsedDocument {
            filename: "p.pdf".to_string(),
            filepath: "/data/p.pdf".to_string(),
            file_type: "pdf".to_string(),
            pages: vec!["Study overview text.".to_string()],
            ..Default::default()
        };
        let chunks = ProtocolChunker::default().chunk_document(&doc);
        let bad = vec![vec![1.0f32, 2.0]; chunks.len()];
        assert!(db.documents.ingest(&doc, &chunks, &bad, false).await.is_err());
    }

    #[tokio::test]
    async fn test_open_file_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protocols.db");
        let db = Database::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(db.documents.list().await.unwrap().is_empty());
    }
}
