use crate::bm25::Bm25Config;
use crate::cache::CacheEviction;
use crate::error::{Result, RetrievalError};
use crate::fusion::{
    ConflictResolutionReranker, CrossEncoderReranker, LexicalOverlapReranker, PairScorer,
    ReciprocalRankFusion, Reranker, ScoreBasedReranker, SimilarityMeasure,
};
use crate::request::MAX_TOP_K;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Reranking strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RerankStrategy {
    /// Reciprocal Rank Fusion over the vector and lexical lists
    ReciprocalRank {
        #[serde(default = "default_rrf_k")]
        k: f32,
    },
    /// Blend of existing score and query/content token overlap
    LexicalOverlap {
        #[serde(default = "default_similarity_weight")]
        similarity_weight: f32,
        #[serde(default)]
        measure: SimilarityMeasure,
    },
    /// Re-sort the merged list by existing score
    ScoreBased,
    /// Scale documents the two lists disagree on by query kind
    ConflictResolution,
    /// Pairwise relevance model; needs an injected scorer
    CrossEncoder,
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_similarity_weight() -> f32 {
    0.3
}

impl Default for RerankStrategy {
    fn default() -> Self {
        RerankStrategy::ReciprocalRank { k: default_rrf_k() }
    }
}

impl FromStr for RerankStrategy {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rrf" | "reciprocal_rank" => Ok(RerankStrategy::default()),
            "lexical_overlap" | "overlap" => Ok(RerankStrategy::LexicalOverlap {
                similarity_weight: default_similarity_weight(),
                measure: SimilarityMeasure::default(),
            }),
            "score_based" | "score" => Ok(RerankStrategy::ScoreBased),
            "conflict_resolution" | "conflict" => Ok(RerankStrategy::ConflictResolution),
            "cross_encoder" => Ok(RerankStrategy::CrossEncoder),
            other => Err(RetrievalError::InvalidStrategy(other.to_string())),
        }
    }
}

impl RerankStrategy {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            RerankStrategy::ReciprocalRank { k } if !(k.is_finite() && k > 0.0) => {
                Err(format!("rrf k must be > 0, got {k}"))
            }
            RerankStrategy::LexicalOverlap {
                similarity_weight, ..
            } if !(0.0..=1.0).contains(&similarity_weight) => Err(format!(
                "similarity_weight must be in [0.0, 1.0], got {similarity_weight}"
            )),
            _ => Ok(()),
        }
    }

    /// Instantiate the reranker. A cross-encoder without a scorer degrades
    /// to score-based ordering.
    pub fn build(&self, scorer: Option<Arc<dyn PairScorer>>) -> Arc<dyn Reranker> {
        match *self {
            RerankStrategy::ReciprocalRank { k } => Arc::new(ReciprocalRankFusion { k }),
            RerankStrategy::LexicalOverlap {
                similarity_weight,
                measure,
            } => Arc::new(LexicalOverlapReranker {
                similarity_weight,
                measure,
            }),
            RerankStrategy::ScoreBased => Arc::new(ScoreBasedReranker),
            RerankStrategy::ConflictResolution => Arc::new(ConflictResolutionReranker),
            RerankStrategy::CrossEncoder => match scorer {
                Some(scorer) => Arc::new(CrossEncoderReranker::new(scorer)),
                None => {
                    warn!("Cross-encoder reranking requested without a scorer, using score-based");
                    Arc::new(ScoreBasedReranker)
                }
            },
        }
    }
}

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Weight for vector results in the weighted union (0.0 - 1.0)
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Weight for lexical results in the weighted union (0.0 - 1.0)
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Candidates requested from the vector store
    #[serde(default = "default_candidate_count")]
    pub vector_top_k: usize,

    /// Candidates requested from BM25
    #[serde(default = "default_candidate_count")]
    pub lexical_top_k: usize,

    /// Result count used when a request does not name one
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,

    #[serde(default = "default_true")]
    pub rerank_enabled: bool,

    #[serde(default)]
    pub rerank_strategy: RerankStrategy,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Cache size (number of queries to cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub cache_eviction: CacheEviction,

    /// Deadline for the vector store call; lexical results are still returned
    /// when it expires
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default)]
    pub bm25: Bm25Config,
}

fn default_vector_weight() -> f32 {
    0.6
}

fn default_lexical_weight() -> f32 {
    0.4
}

fn default_candidate_count() -> usize {
    50
}

fn default_final_top_k() -> usize {
    crate::request::DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            vector_top_k: default_candidate_count(),
            lexical_top_k: default_candidate_count(),
            final_top_k: default_final_top_k(),
            rerank_enabled: true,
            rerank_strategy: RerankStrategy::default(),
            cache_enabled: true,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_eviction: CacheEviction::default(),
            query_timeout_ms: default_query_timeout_ms(),
            bm25: Bm25Config::default(),
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(format!(
                "vector_weight must be in [0.0, 1.0], got {}",
                self.vector_weight
            ));
        }

        if !(0.0..=1.0).contains(&self.lexical_weight) {
            return Err(format!(
                "lexical_weight must be in [0.0, 1.0], got {}",
                self.lexical_weight
            ));
        }

        if self.vector_top_k == 0 {
            return Err("vector_top_k must be > 0".to_string());
        }

        if self.lexical_top_k == 0 {
            return Err("lexical_top_k must be > 0".to_string());
        }

        if self.final_top_k == 0 {
            return Err("final_top_k must be > 0".to_string());
        }

        if self.final_top_k > MAX_TOP_K {
            return Err(format!(
                "final_top_k must be <= {MAX_TOP_K}, got {}",
                self.final_top_k
            ));
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if self.cache_ttl_secs == 0 {
            return Err("cache_ttl_secs must be > 0".to_string());
        }

        if self.query_timeout_ms == 0 {
            return Err("query_timeout_ms must be > 0".to_string());
        }

        self.rerank_strategy.validate()?;
        self.bm25.validate()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RetrievalConfig = toml::from_str(contents)?;
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply a partial update, validating the result
    pub fn merged(&self, update: &RetrievalConfigUpdate) -> Result<Self> {
        let mut config = self.clone();
        if let Some(v) = update.vector_weight {
            config.vector_weight = v;
        }
        if let Some(v) = update.lexical_weight {
            config.lexical_weight = v;
        }
        if let Some(v) = update.vector_top_k {
            config.vector_top_k = v;
        }
        if let Some(v) = update.lexical_top_k {
            config.lexical_top_k = v;
        }
        if let Some(v) = update.final_top_k {
            config.final_top_k = v;
        }
        if let Some(v) = update.rerank_enabled {
            config.rerank_enabled = v;
        }
        if let Some(v) = update.rerank_strategy {
            config.rerank_strategy = v;
        }
        if let Some(v) = update.cache_enabled {
            config.cache_enabled = v;
        }
        if let Some(v) = update.cache_capacity {
            config.cache_capacity = v;
        }
        if let Some(v) = update.cache_ttl_secs {
            config.cache_ttl_secs = v;
        }
        if let Some(v) = update.cache_eviction {
            config.cache_eviction = v;
        }
        if let Some(v) = update.query_timeout_ms {
            config.query_timeout_ms = v;
        }
        if let Some(v) = update.bm25 {
            config.bm25 = v;
        }
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(config)
    }

    /// Create config optimized for speed
    pub fn fast() -> Self {
        Self {
            vector_top_k: 20,
            lexical_top_k: 20,
            final_top_k: 10,
            rerank_enabled: false,
            query_timeout_ms: 1_000,
            ..Default::default()
        }
    }

    /// Create config optimized for accuracy
    pub fn accurate() -> Self {
        Self {
            vector_top_k: 100,
            lexical_top_k: 100,
            rerank_strategy: RerankStrategy::LexicalOverlap {
                similarity_weight: default_similarity_weight(),
                measure: SimilarityMeasure::QueryCoverage,
            },
            query_timeout_ms: 10_000,
            ..Default::default()
        }
    }

    /// Create config for deployments without a vector store
    pub fn lexical_only() -> Self {
        Self {
            vector_weight: 0.0,
            lexical_weight: 1.0,
            rerank_enabled: false,
            ..Default::default()
        }
    }
}

/// Partial configuration for live updates. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfigUpdate {
    pub vector_weight: Option<f32>,
    pub lexical_weight: Option<f32>,
    pub vector_top_k: Option<usize>,
    pub lexical_top_k: Option<usize>,
    pub final_top_k: Option<usize>,
    pub rerank_enabled: Option<bool>,
    pub rerank_strategy: Option<RerankStrategy>,
    pub cache_enabled: Option<bool>,
    pub cache_capacity: Option<usize>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_eviction: Option<CacheEviction>,
    pub query_timeout_ms: Option<u64>,
    pub bm25: Option<Bm25Config>,
}
