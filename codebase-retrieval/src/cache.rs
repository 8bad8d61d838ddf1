use crate::result::HybridResults;
use crate::request::SearchRequest;
use coderag_vector_store::ContentTypeFilter;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Which entry makes room when the cache is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEviction {
    /// Drop the oldest inserted entry; reads do not refresh position
    #[default]
    InsertionOrder,
    /// Drop the least recently read or written entry
    LeastRecentlyUsed,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Serialize)]
struct CacheKey<'a> {
    query: &'a str,
    language: Option<&'a str>,
    repo: Option<&'a str>,
    file_path: Option<&'a str>,
    content_type: Option<ContentTypeFilter>,
    top_k: usize,
}

/// Canonical key for a request and its effective result count. Requests that
/// differ only in an explicit `both` content type versus none share a key.
pub fn cache_key(request: &SearchRequest, top_k: usize) -> Option<String> {
    let key = CacheKey {
        query: &request.query,
        language: request.language.as_deref(),
        repo: request.repo.as_deref(),
        file_path: request.file_path.as_deref(),
        content_type: request
            .content_type
            .filter(|filter| *filter != ContentTypeFilter::Both),
        top_k,
    };
    serde_json::to_string(&key).ok()
}

struct CacheEntry {
    results: HybridResults,
    created_at: Instant,
}

struct CacheState {
    entries: IndexMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    eviction: CacheEviction,
    hits: u64,
    misses: u64,
}

/// Bounded TTL cache of result bundles.
///
/// Expired entries are only noticed on read. Locks are never held across an
/// await point.
///
/// Every [`ResultCache::clear`] starts a new generation. A bundle computed
/// under an older generation is refused by [`ResultCache::insert`], so a
/// search that overlaps a corpus change cannot repopulate the cache.
pub struct ResultCache {
    state: Mutex<CacheState>,
    generation: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration, eviction: CacheEviction) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: IndexMap::new(),
                capacity,
                ttl,
                eviction,
                hits: 0,
                misses: 0,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Current generation; capture it before computing a bundle
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self, key: &str) -> Option<HybridResults> {
        let mut state = self.lock();

        let Some(index) = state.entries.get_index_of(key) else {
            state.misses += 1;
            return None;
        };

        let expired = state
            .entries
            .get_index(index)
            .is_some_and(|(_, entry)| entry.created_at.elapsed() >= state.ttl);
        if expired {
            debug!("Cache entry expired for key {key}");
            state.entries.shift_remove_index(index);
            state.misses += 1;
            return None;
        }

        if state.eviction == CacheEviction::LeastRecentlyUsed {
            let last = state.entries.len() - 1;
            state.entries.move_index(index, last);
        }
        state.hits += 1;
        state
            .entries
            .get(key)
            .map(|entry| entry.results.clone())
    }

    /// Store a bundle computed under `generation`. Returns `false` when the
    /// cache was cleared since then and the bundle was dropped.
    pub fn insert(&self, key: String, results: HybridResults, generation: u64) -> bool {
        let mut state = self.lock();
        if self.generation() != generation {
            debug!("Dropping bundle from a cleared cache generation for key {key}");
            return false;
        }
        if state.capacity == 0 {
            return false;
        }

        state.entries.shift_remove(&key);
        while state.entries.len() >= state.capacity {
            if let Some((evicted, _)) = state.entries.shift_remove_index(0) {
                debug!("Evicting cache entry {evicted}");
            }
        }
        state.entries.insert(
            key,
            CacheEntry {
                results,
                created_at: Instant::now(),
            },
        );
        true
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        state.entries.clear();
    }

    /// Apply new limits, dropping the oldest entries if over capacity
    pub fn reconfigure(&self, capacity: usize, ttl: Duration, eviction: CacheEviction) {
        let mut state = self.lock();
        state.capacity = capacity;
        state.ttl = ttl;
        state.eviction = eviction;
        let excess = state.entries.len().saturating_sub(capacity);
        if excess > 0 {
            state.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            size: state.entries.len(),
            capacity: state.capacity,
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
