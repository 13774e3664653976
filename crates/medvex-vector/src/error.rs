//! Vector store error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection {collection} exists with dimension {actual}, expected {expected}")]
    SchemaConflict {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("rejected {actual}-dim vector for collection {collection} (dimension {expected})")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("vector store API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}
