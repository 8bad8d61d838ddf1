use crate::bm25::{Bm25Engine, Bm25Stats};
use crate::cache::{CacheStats, ResultCache, cache_key};
use crate::config::{RetrievalConfig, RetrievalConfigUpdate};
use crate::error::{Result, RetrievalError};
use crate::fusion::{PairScorer, Reranker, truncate_ranked, weighted_union};
use crate::request::SearchRequest;
use crate::result::{HybridResults, RankedResult, SearchStats};
use coderag_vector_store::{Document, DocumentSource, SearchFilters, VectorQuery, VectorSearch};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Config together with the reranker built from it, swapped as one unit
struct Settings {
    config: RetrievalConfig,
    reranker: Arc<dyn Reranker>,
}

/// Engine state reported by [`HybridRetrieval::stats`]
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalStats {
    pub initialized: bool,
    pub lexical: Bm25Stats,
    pub cache: CacheStats,
    pub config: RetrievalConfig,
}

/// Hybrid retrieval engine combining vector and BM25 search
pub struct HybridRetrieval {
    vector_search: Arc<dyn VectorSearch>,
    lexical: Arc<RwLock<Bm25Engine>>,
    settings: RwLock<Settings>,
    pair_scorer: Option<Arc<dyn PairScorer>>,
    custom_reranker: Option<Arc<dyn Reranker>>,
    cache: ResultCache,
    initialized: AtomicBool,
}

impl HybridRetrieval {
    /// Create new hybrid retrieval engine
    pub fn new(config: RetrievalConfig, vector_search: Arc<dyn VectorSearch>) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;

        info!("Initializing hybrid retrieval engine");

        let cache = ResultCache::new(
            config.cache_capacity,
            config.cache_ttl(),
            config.cache_eviction,
        );
        let lexical = Bm25Engine::new(config.bm25);
        let reranker = config.rerank_strategy.build(None);

        Ok(Self {
            vector_search,
            lexical: Arc::new(RwLock::new(lexical)),
            settings: RwLock::new(Settings { config, reranker }),
            pair_scorer: None,
            custom_reranker: None,
            cache,
            initialized: AtomicBool::new(false),
        })
    }

    /// Provide the relevance model used by the cross-encoder strategy
    pub fn with_pair_scorer(mut self, scorer: Arc<dyn PairScorer>) -> Self {
        self.pair_scorer = Some(scorer);
        self.rebuild_reranker_now();
        self
    }

    /// Use a caller-supplied reranker regardless of the configured strategy
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.custom_reranker = Some(reranker);
        self.rebuild_reranker_now();
        self
    }

    fn rebuild_reranker_now(&mut self) {
        let settings = self.settings.get_mut();
        settings.reranker = build_reranker(
            &settings.config,
            self.custom_reranker.as_ref(),
            self.pair_scorer.as_ref(),
        );
    }

    /// Cold-load the lexical corpus from a document source and build the index
    pub async fn initialize(&self, source: &dyn DocumentSource) -> Result<()> {
        let documents = source.load_documents().await?;
        info!("Loaded {} documents for lexical indexing", documents.len());

        let engine = Arc::clone(&self.lexical);
        tokio::task::spawn_blocking(move || {
            let mut engine = engine.blocking_write();
            engine.set_documents(documents);
            engine.build_index();
        })
        .await
        .map_err(|e| RetrievalError::Lexical(format!("index build failed: {e}")))?;

        self.initialized.store(true, Ordering::Release);
        self.cache.clear();
        Ok(())
    }

    /// Replace the lexical corpus. The index is rebuilt on next use.
    pub async fn set_documents(&self, documents: Vec<Document>) {
        self.lexical.write().await.set_documents(documents);
        self.cache.clear();
    }

    /// Append to the lexical corpus. The index is rebuilt on next use.
    pub async fn add_documents(&self, documents: Vec<Document>) {
        self.lexical.write().await.add_documents(documents);
        self.cache.clear();
    }

    /// Search for relevant fragments
    pub async fn search(&self, request: &SearchRequest) -> Result<HybridResults> {
        let (results, _) = self.search_with_stats(request).await?;
        Ok(results)
    }

    /// Search and report where the time went
    pub async fn search_with_stats(
        &self,
        request: &SearchRequest,
    ) -> Result<(HybridResults, SearchStats)> {
        request.validate()?;
        let start = Instant::now();
        let generation = self.cache.generation();

        let (config, reranker) = {
            let settings = self.settings.read().await;
            (settings.config.clone(), Arc::clone(&settings.reranker))
        };
        let top_k = request.top_k_or(config.final_top_k);

        let key = if config.cache_enabled {
            cache_key(request, top_k)
        } else {
            None
        };
        if let Some(cached) = key.as_deref().and_then(|key| self.cache.get(key)) {
            info!("Cache hit for query: '{}'", request.query);
            let stats = SearchStats {
                total_time_ms: elapsed_ms(start),
                vector_count: cached.vector_results.len(),
                lexical_count: cached.lexical_results.len(),
                cache_hit: true,
                ..Default::default()
            };
            return Ok((cached, stats));
        }

        if !self.is_initialized() {
            debug!("Searching before initialization; lexical corpus may be empty");
        }

        let filters = request.filters();
        if request.is_file_listing() {
            let (results, stats) = self.list_file(request, filters, top_k, start).await;
            if let Some(key) = key {
                self.cache.insert(key, results.clone(), generation);
            }
            return Ok((results, stats));
        }

        debug!("Hybrid search for: '{}'", request.query);
        let vector_query = VectorQuery::new(request.query.clone()).with_filters(filters.clone());

        let (
            (vector_results, vector_time_ms, vector_degraded),
            (lexical_results, lexical_time_ms),
        ) = tokio::join!(
            self.vector_stage(
                &vector_query,
                config.vector_top_k.max(top_k),
                config.query_timeout()
            ),
            self.lexical_stage(
                request.query.clone(),
                filters,
                config.lexical_top_k.max(top_k)
            ),
        );
        debug!(
            "Vector search found {} results, lexical search found {}",
            vector_results.len(),
            lexical_results.len()
        );

        let fusion_start = Instant::now();
        let mut results = HybridResults::new(request.query.clone());
        if config.rerank_enabled {
            let lists = [vector_results, lexical_results];
            let reranked = reranker.rerank(&request.query, &lists, top_k);
            debug!("{} reranking produced {} results", reranker.name(), reranked.len());
            let [vector_results, lexical_results] = lists;
            results.vector_results = vector_results;
            results.lexical_results = lexical_results;
            results.final_results = reranked.clone();
            results.reranked_results = reranked;
        } else {
            let combined = weighted_union(
                &vector_results,
                &lexical_results,
                config.vector_weight,
                config.lexical_weight,
            );
            results.final_results = truncate_ranked(combined, top_k);
            results.vector_results = vector_results;
            results.lexical_results = lexical_results;
        }

        let stats = SearchStats {
            total_time_ms: elapsed_ms(start),
            vector_time_ms,
            lexical_time_ms,
            fusion_time_ms: elapsed_ms(fusion_start),
            vector_count: results.vector_results.len(),
            lexical_count: results.lexical_results.len(),
            vector_degraded,
            cache_hit: false,
        };

        if let Some(key) = key {
            self.cache.insert(key, results.clone(), generation);
        }

        info!(
            "Search completed in {}ms, returned {} results",
            stats.total_time_ms,
            results.len()
        );
        Ok((results, stats))
    }

    /// Every indexed fragment of one file, in corpus order. The vector store
    /// is not consulted.
    async fn list_file(
        &self,
        request: &SearchRequest,
        filters: SearchFilters,
        top_k: usize,
        start: Instant,
    ) -> (HybridResults, SearchStats) {
        let lexical_start = Instant::now();
        let engine = Arc::clone(&self.lexical);
        let task = tokio::task::spawn_blocking(move || {
            if let Some(results) = engine.blocking_read().try_list(&filters, top_k) {
                return results;
            }
            engine.blocking_write().list(&filters, top_k)
        });
        let listed = match task.await {
            Ok(results) => results,
            Err(e) => {
                warn!("File listing failed: {e}");
                Vec::new()
            }
        };
        debug!(
            "Listed {} fragments of {:?}",
            listed.len(),
            request.file_path.as_deref()
        );

        let mut results = HybridResults::new(request.query.clone());
        results.final_results = listed.clone();
        results.lexical_results = listed;

        let stats = SearchStats {
            total_time_ms: elapsed_ms(start),
            lexical_time_ms: elapsed_ms(lexical_start),
            lexical_count: results.lexical_results.len(),
            ..Default::default()
        };
        (results, stats)
    }

    /// Vector search under the query deadline. Failures become an empty list.
    async fn vector_stage(
        &self,
        query: &VectorQuery,
        top_k: usize,
        deadline: Duration,
    ) -> (Vec<RankedResult>, u64, bool) {
        let start = Instant::now();
        let outcome = tokio::time::timeout(deadline, self.vector_search.search(query, top_k)).await;
        let (results, degraded) = match outcome {
            Ok(Ok(hits)) => {
                let results = hits.into_iter().map(RankedResult::from).collect();
                (truncate_ranked(results, top_k), false)
            }
            Ok(Err(e)) => {
                warn!("Vector search failed, continuing with lexical results: {e}");
                (Vec::new(), true)
            }
            Err(_) => {
                warn!(
                    "Vector search exceeded {}ms, continuing with lexical results",
                    deadline.as_millis()
                );
                (Vec::new(), true)
            }
        };
        (results, elapsed_ms(start), degraded)
    }

    /// BM25 search on a blocking worker. Searches share the read lock; a
    /// stale index is rebuilt under the write lock. Failures become an empty
    /// list.
    async fn lexical_stage(
        &self,
        query: String,
        filters: SearchFilters,
        top_k: usize,
    ) -> (Vec<RankedResult>, u64) {
        let start = Instant::now();
        let engine = Arc::clone(&self.lexical);
        let task = tokio::task::spawn_blocking(move || {
            if let Some(results) = engine.blocking_read().try_search(&query, &filters, top_k) {
                return results;
            }
            engine.blocking_write().search(&query, &filters, top_k)
        });

        let results = match task.await {
            Ok(results) => results,
            Err(e) => {
                warn!("Lexical search failed, continuing with vector results: {e}");
                Vec::new()
            }
        };
        (results, elapsed_ms(start))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub async fn stats(&self) -> RetrievalStats {
        let lexical = self.lexical.read().await.stats();
        let config = self.settings.read().await.config.clone();
        RetrievalStats {
            initialized: self.is_initialized(),
            lexical,
            cache: self.cache.stats(),
            config,
        }
    }

    /// Clear search cache
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Search cache cleared");
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get configuration
    pub async fn config(&self) -> RetrievalConfig {
        self.settings.read().await.config.clone()
    }

    /// Merge a partial config, validate it, and apply it everywhere it is
    /// used. Cached bundles are dropped.
    pub async fn update_config(&self, update: RetrievalConfigUpdate) -> Result<RetrievalConfig> {
        let mut settings = self.settings.write().await;
        let config = settings.config.merged(&update)?;

        settings.reranker = build_reranker(
            &config,
            self.custom_reranker.as_ref(),
            self.pair_scorer.as_ref(),
        );
        self.lexical.write().await.set_config(config.bm25);
        self.cache.reconfigure(
            config.cache_capacity,
            config.cache_ttl(),
            config.cache_eviction,
        );
        self.cache.clear();
        settings.config = config.clone();

        info!("Retrieval configuration updated");
        Ok(config)
    }

    /// Close the vector store, drop the corpus and cache, and mark the engine
    /// uninitialized
    pub async fn shutdown(&self) {
        if let Err(e) = self.vector_search.close().await {
            warn!("Failed to close vector store: {e}");
        }
        self.lexical.write().await.clear();
        self.cache.clear();
        self.initialized.store(false, Ordering::Release);
        info!("Hybrid retrieval engine shut down");
    }
}

fn build_reranker(
    config: &RetrievalConfig,
    custom: Option<&Arc<dyn Reranker>>,
    scorer: Option<&Arc<dyn PairScorer>>,
) -> Arc<dyn Reranker> {
    match custom {
        Some(reranker) => Arc::clone(reranker),
        None => config.rerank_strategy.build(scorer.cloned()),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
