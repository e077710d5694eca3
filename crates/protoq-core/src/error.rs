//! Error types for protoq.

use thiserror::Error;

/// Result type alias using protoq's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for protoq operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found by numeric id
    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    /// Protocol not found by declared protocol identifier
    #[error("Protocol not found: {0}")]
    ProtocolNotFound(String),

    /// Embedding generation or decoding failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
