use coderag_vector_store::{ContentType, Document, VectorHit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source of a search result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    /// From dense vector search
    Vector,
    /// From BM25 lexical search
    Lexical,
    /// From fusion or reranking
    Hybrid,
}

/// A single ranked result.
///
/// `score` is only comparable to other scores with the same `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub repo: String,
    pub path: String,
    pub content: String,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Relevance score, higher is better
    pub score: f32,

    /// Ranking method that produced `score`
    pub source: SearchSource,

    /// Rank in the result list (0 = best)
    pub rank: usize,
}

impl RankedResult {
    /// Create a result from an indexed document
    pub fn from_document(document: &Document, score: f32, source: SearchSource) -> Self {
        Self {
            id: document.id.clone(),
            repo: document.repo.clone(),
            path: document.path.clone(),
            content: document.content.clone(),
            content_type: document.content_type,
            language: document.language.clone(),
            start_line: document.start_line,
            end_line: document.end_line,
            metadata: document.metadata.clone(),
            score,
            source,
            rank: 0,
        }
    }

    /// Set rank
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Copy of this result rescored under a different ranking method
    pub fn rescored(&self, score: f32, source: SearchSource) -> Self {
        Self {
            score,
            source,
            ..self.clone()
        }
    }
}

impl From<VectorHit> for RankedResult {
    fn from(hit: VectorHit) -> Self {
        RankedResult::from_document(&hit.document, hit.score, SearchSource::Vector)
    }
}

/// Sort by descending score, keeping input order for ties, and renumber ranks
pub(crate) fn sort_and_rank(results: &mut Vec<RankedResult>, top_k: usize) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    assign_ranks(results);
}

pub(crate) fn assign_ranks(results: &mut [RankedResult]) {
    for (rank, result) in results.iter_mut().enumerate() {
        result.rank = rank;
    }
}

/// Everything one hybrid query produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridResults {
    /// Query that produced these results
    pub query: String,

    pub vector_results: Vec<RankedResult>,

    pub lexical_results: Vec<RankedResult>,

    /// Empty when reranking is disabled
    pub reranked_results: Vec<RankedResult>,

    /// The list callers should surface
    pub final_results: Vec<RankedResult>,
}

impl HybridResults {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            vector_results: Vec::new(),
            lexical_results: Vec::new(),
            reranked_results: Vec::new(),
            final_results: Vec::new(),
        }
    }

    /// Get top N final results
    pub fn top(&self, n: usize) -> &[RankedResult] {
        &self.final_results[..n.min(self.final_results.len())]
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.final_results.is_empty()
    }

    /// Number of final results
    pub fn len(&self) -> usize {
        self.final_results.len()
    }
}

/// Search performance statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Total search time in milliseconds
    pub total_time_ms: u64,

    /// Vector search time in milliseconds
    pub vector_time_ms: u64,

    /// Lexical search time in milliseconds
    pub lexical_time_ms: u64,

    /// Fusion and reranking time in milliseconds
    pub fusion_time_ms: u64,

    /// Number of vector results
    pub vector_count: usize,

    /// Number of lexical results
    pub lexical_count: usize,

    /// Vector search failed or hit the deadline and was replaced by an empty list
    pub vector_degraded: bool,

    /// Cache hit
    pub cache_hit: bool,
}
