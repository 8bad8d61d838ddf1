use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Vector store error: {0}")]
    VectorStore(#[from] coderag_vector_store::VectorStoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error("Invalid retrieval strategy: {0}")]
    InvalidStrategy(String),

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lexical search error: {0}")]
    Lexical(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
