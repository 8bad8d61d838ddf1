// In-memory vector store over caller-supplied embeddings.
// Vectors are produced outside this crate; the store only compares them.

use crate::adapter::{DocumentSource, Embedder, VectorHit, VectorQuery, VectorSearch};
use crate::chunk::Document;
use crate::error::VectorStoreError;
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Configuration for the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Dimension of the embeddings
    pub embedding_dim: usize,

    /// Hits scoring below this similarity are dropped
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 768,
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    document: Document,
    vector: Vec<f32>,
}

/// Simplified in-memory vector store with optional JSON snapshot persistence
pub struct InMemoryVectorStore {
    snapshot_path: Option<PathBuf>,
    embedder: Arc<dyn Embedder>,
    config: VectorStoreConfig,
    documents: RwLock<Vec<StoredDocument>>,
    closed: AtomicBool,
}

impl InMemoryVectorStore {
    /// Create an empty store that lives only in memory
    pub fn new(embedder: Arc<dyn Embedder>, config: VectorStoreConfig) -> Self {
        Self {
            snapshot_path: None,
            embedder,
            config,
            documents: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a store backed by a JSON snapshot, loading it if present
    pub async fn open(
        snapshot_path: &Path,
        embedder: Arc<dyn Embedder>,
        config: VectorStoreConfig,
    ) -> Result<Self, VectorStoreError> {
        info!("Opening vector store at {}", snapshot_path.display());

        if let Some(parent) = snapshot_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let documents = if tokio::fs::try_exists(snapshot_path).await? {
            match Self::load_from_disk(snapshot_path).await {
                Ok(data) => data,
                Err(e) => {
                    debug!("Could not load existing snapshot: {e}, starting fresh");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!("Vector store opened with {} documents", documents.len());
        Ok(Self {
            snapshot_path: Some(snapshot_path.to_path_buf()),
            embedder,
            config,
            documents: RwLock::new(documents),
            closed: AtomicBool::new(false),
        })
    }

    async fn load_from_disk(path: &Path) -> Result<Vec<StoredDocument>, VectorStoreError> {
        let content = tokio::fs::read(path).await?;
        let documents: Vec<StoredDocument> = serde_json::from_slice(&content)?;
        Ok(documents)
    }

    async fn save_to_disk(&self) -> Result<(), VectorStoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let documents = self.documents.read().await;
        let content = serde_json::to_vec(&*documents)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Add documents together with their precomputed embeddings
    pub async fn add_documents(
        &self,
        entries: Vec<(Document, Vec<f32>)>,
    ) -> Result<(), VectorStoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;

        for (document, vector) in &entries {
            if vector.len() != self.config.embedding_dim {
                return Err(VectorStoreError::AdditionFailed(format!(
                    "document '{}' has dimension {}, expected {}",
                    document.id,
                    vector.len(),
                    self.config.embedding_dim
                )));
            }
        }

        info!("Adding {} documents to vector store", entries.len());

        {
            let mut stored = self.documents.write().await;
            for (document, vector) in entries {
                stored.push(StoredDocument { document, vector });
            }
        }

        self.save_to_disk().await
    }

    /// Get the total number of documents in the store
    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Get the configuration of this vector store
    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<(), VectorStoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(VectorStoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorStore {
    async fn search(
        &self,
        query: &VectorQuery,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        self.ensure_open()?;
        debug!("Searching for: '{}' (limit: {})", query.text, top_k);

        if query.text.trim().is_empty() {
            return Err(VectorStoreError::InvalidQuery("empty query".to_string()));
        }

        let query_embedding = self
            .embedder
            .embed_query(&query.text)
            .map_err(|e| match e {
                VectorStoreError::Embedding(_) => e,
                other => VectorStoreError::Embedding(other.to_string()),
            })?;
        if query_embedding.len() != self.config.embedding_dim {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual: query_embedding.len(),
            });
        }

        let documents = self.documents.read().await;
        let mut scored: Vec<(usize, f32)> = documents
            .iter()
            .enumerate()
            .filter(|(_, stored)| query.filters.matches(&stored.document))
            .map(|(idx, stored)| (idx, cosine_similarity(&query_embedding, &stored.vector)))
            .filter(|(_, score)| self.config.min_score.is_none_or(|min| *score >= min))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        let hits: Vec<VectorHit> = scored
            .into_iter()
            .map(|(idx, score)| VectorHit {
                document: documents[idx].document.clone(),
                score,
            })
            .collect();

        debug!("Found {} results", hits.len());
        Ok(hits)
    }

    async fn close(&self) -> Result<(), VectorStoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Closing vector store");
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentSource for InMemoryVectorStore {
    async fn load_documents(&self) -> Result<Vec<Document>, VectorStoreError> {
        self.ensure_open()?;
        let documents = self.documents.read().await;
        Ok(documents.iter().map(|stored| stored.document.clone()).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ContentType;
    use crate::filter::{ContentTypeFilter, SearchFilters};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Maps a handful of known words onto fixed axes
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        fn embed_query(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
            Ok(axes(text))
        }
    }

    fn axes(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        vec![
            f32::from(u8::from(text.contains("auth"))),
            f32::from(u8::from(text.contains("database"))),
            f32::from(u8::from(text.contains("login"))),
        ]
    }

    fn config() -> VectorStoreConfig {
        VectorStoreConfig {
            embedding_dim: 3,
            min_score: None,
        }
    }

    fn entries() -> Vec<(Document, Vec<f32>)> {
        let docs = vec![
            Document::new("auth", "authenticate user token").with_path("auth.rs"),
            Document::new("db", "connect database pool").with_path("db.rs"),
            Document::new("guide", "login and auth guide")
                .with_path("README.md")
                .with_content_type(ContentType::Doc),
        ];
        docs.into_iter()
            .map(|doc| {
                let vector = axes(&doc.content);
                (doc, vector)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder), config());
        store.add_documents(entries()).await.unwrap();

        let hits = store.search(&VectorQuery::new("auth"), 3).await.unwrap();
        assert_eq!(hits[0].document.id, "auth");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_applies_filters() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder), config());
        store.add_documents(entries()).await.unwrap();

        let query = VectorQuery::new("auth").with_filters(SearchFilters {
            content_type: Some(ContentTypeFilter::Doc),
            ..Default::default()
        });
        let hits = store.search(&query, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "guide");
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder), config());
        let result = store
            .add_documents(vec![(Document::new("x", "text"), vec![1.0])])
            .await;
        assert!(matches!(result, Err(VectorStoreError::AdditionFailed(_))));
    }

    #[tokio::test]
    async fn test_embedder_failure_is_an_embedding_error() {
        struct UnavailableEmbedder;

        impl Embedder for UnavailableEmbedder {
            fn embed_query(&self, _text: &str) -> Result<Vec<f32>, VectorStoreError> {
                Err(VectorStoreError::Io(std::io::Error::other("model server unreachable")))
            }
        }

        let store = InMemoryVectorStore::new(Arc::new(UnavailableEmbedder), config());
        store.add_documents(entries()).await.unwrap();

        let result = store.search(&VectorQuery::new("auth"), 3).await;
        match result {
            Err(VectorStoreError::Embedding(message)) => {
                assert!(message.contains("model server unreachable"));
            }
            other => panic!("expected an embedding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_store_fails_search() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder), config());
        store.close().await.unwrap();
        let result = store.search(&VectorQuery::new("auth"), 3).await;
        assert!(matches!(result, Err(VectorStoreError::Closed)));
    }

    #[tokio::test]
    async fn test_snapshot_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.json");

        {
            let store = InMemoryVectorStore::open(&path, Arc::new(KeywordEmbedder), config())
                .await
                .unwrap();
            store.add_documents(entries()).await.unwrap();
        }

        let reopened = InMemoryVectorStore::open(&path, Arc::new(KeywordEmbedder), config())
            .await
            .unwrap();
        assert_eq!(reopened.count().await, 3);
        let docs = reopened.load_documents().await.unwrap();
        assert_eq!(docs[1].id, "db");
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 3.0];
        let c = vec![-1.0, -2.0, -3.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }
}
