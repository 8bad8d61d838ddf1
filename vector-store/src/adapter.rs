use crate::chunk::Document;
use crate::error::VectorStoreError;
use crate::filter::SearchFilters;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A similarity query issued against a vector store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    /// Free-text query; the store is responsible for embedding it
    pub text: String,

    /// Per-item filters the store must apply
    #[serde(default)]
    pub filters: SearchFilters,
}

impl VectorQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filters: SearchFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// A document returned by a vector store, scored by similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub document: Document,

    /// Similarity score (cosine similarity for the bundled store, higher is better)
    pub score: f32,
}

/// Similarity search over an external vector store.
///
/// Implementations may fail; callers are expected to degrade gracefully.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return at most `top_k` hits ordered by descending similarity
    async fn search(
        &self,
        query: &VectorQuery,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;

    /// Release any held connections
    async fn close(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

/// Bulk source of indexable documents, read once at initialization
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load_documents(&self) -> Result<Vec<Document>, VectorStoreError>;
}

#[async_trait]
impl DocumentSource for Vec<Document> {
    async fn load_documents(&self) -> Result<Vec<Document>, VectorStoreError> {
        Ok(self.clone())
    }
}

/// Turns query text into a vector for the bundled in-memory store
pub trait Embedder: Send + Sync {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, VectorStoreError>;
}

/// Adapter for deployments without a vector store: every search is empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVectorSearch;

#[async_trait]
impl VectorSearch for NoopVectorSearch {
    async fn search(
        &self,
        _query: &VectorQuery,
        _top_k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_noop_search_is_empty() {
        let hits = NoopVectorSearch
            .search(&VectorQuery::new("anything"), 10)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert!(NoopVectorSearch.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_vec_is_a_document_source() {
        let docs = vec![Document::new("a", "alpha"), Document::new("b", "beta")];
        let loaded = docs.load_documents().await.unwrap();
        assert_eq!(loaded, docs);
    }
}
