//! # protoq-search
//!
//! Retrieval layer for protoq:
//! - BM25 lexical search over the FTS5 index
//! - Brute-force cosine similarity search over stored embeddings
//! - Reciprocal rank fusion of the two
//! - Cross-protocol eligibility criteria matching

pub mod fts;
pub mod hybrid;
pub mod matcher;
pub mod rrf;
pub mod vector;

pub use fts::{build_fts_query, FtsSearch};
pub use hybrid::SearchEngine;
pub use matcher::CriteriaMatcher;
pub use rrf::fuse;
pub use vector::VectorSearch;

// Re-export core types
pub use protoq_core::*;
