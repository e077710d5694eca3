//! # protoq-core
//!
//! Core types, traits, and abstractions for the protoq library.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the protoq storage and search crates depend on.

pub mod config;
pub mod defaults;
pub mod embedding;
pub mod error;
pub mod models;
pub mod vector;

// Re-export commonly used types at crate root
pub use config::Config;
pub use embedding::EmbeddingProvider;
pub use error::{Error, Result};
pub use models::*;
pub use vector::{cosine_similarity, decode_embedding, encode_embedding};
