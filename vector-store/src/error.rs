use thiserror::Error;

/// Errors that can occur during vector store operations
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Failed to add data to the vector store
    #[error("Failed to add data: {0}")]
    AdditionFailed(String),

    /// Failed to search the vector store
    #[error("Failed to search: {0}")]
    SearchFailed(String),

    /// Invalid query provided
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding dimension does not match the store
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Query embedding could not be produced
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The store has been closed
    #[error("Vector store is closed")]
    Closed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
