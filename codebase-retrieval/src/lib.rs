/*!
# Coderag Retrieval

Hybrid retrieval engine for code and documentation search combining:
- **BM25 lexical search** over an in-memory inverted index
- **Vector search** through an injected [`VectorSearch`](coderag_vector_store::VectorSearch) adapter
- **Reciprocal Rank Fusion (RRF)** for combining differently scaled rankings
- **Heuristic reranking** (lexical overlap, score-based, conflict resolution)

## Features

- **Concurrent pipeline**: vector and lexical search run side by side
- **Graceful degradation**: a failing or slow vector store yields lexical-only results
- **Pluggable rerankers**: one-method [`Reranker`] trait, chosen through config
- **TTL result cache**: insertion-order eviction, LRU on request
- **Live reconfiguration**: partial updates validated before they apply

## Architecture

```text
SearchRequest
  ├─> Vector Search (adapter, under deadline)
  │     └─> Top-K candidates
  ├─> BM25 Search (blocking worker, shared index)
  │     └─> Top-K candidates
  └─> Weighted union / Rerank (RRF by default)
        └─> HybridResults (cached)
```

## Example

```rust,no_run
use coderag_retrieval::{HybridRetrieval, RetrievalConfig, SearchRequest};
use coderag_vector_store::{Document, NoopVectorSearch};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let retrieval = HybridRetrieval::new(RetrievalConfig::lexical_only(), Arc::new(NoopVectorSearch))?;
    let documents = vec![Document::new("a", "fn retry_with_backoff() {}")];
    retrieval.initialize(&documents).await?;

    let results = retrieval.search(&SearchRequest::new("retry backoff")).await?;
    for (i, result) in results.top(5).iter().enumerate() {
        println!("{}. {} (score: {:.2})", i + 1, result.path, result.score);
    }

    Ok(())
}
```

## Rerank Strategies

- **ReciprocalRank** (default): rank-based, insensitive to score scales
- **LexicalOverlap**: blends score with query/content token overlap
- **ScoreBased**: merge and re-sort by existing score
- **ConflictResolution**: arbitrates between vector and lexical top hits by query kind
- **CrossEncoder**: pairwise scorer supplied by the caller, score-based without one
*/

mod bm25;
mod cache;
mod config;
mod error;
mod fusion;
mod request;
mod result;
mod retrieval;
mod tokenizer;

pub use bm25::{Bm25Config, Bm25Engine, Bm25Stats, IndexState, InvertedIndex};
pub use cache::{CacheEviction, CacheStats, ResultCache, cache_key};
pub use config::{RerankStrategy, RetrievalConfig, RetrievalConfigUpdate};
pub use error::{Result, RetrievalError};
pub use fusion::{
    ConflictResolutionReranker, CrossEncoderReranker, LexicalOverlapReranker, PairScorer,
    QueryKind, ReciprocalRankFusion, Reranker, ScoreBasedReranker, SimilarityMeasure,
    merge_unique, min_max_normalize, weighted_union,
};
pub use request::{DEFAULT_TOP_K, MAX_TOP_K, SearchRequest, preview};
pub use result::{HybridResults, RankedResult, SearchSource, SearchStats};
pub use retrieval::{HybridRetrieval, RetrievalStats};
pub use tokenizer::tokenize;
