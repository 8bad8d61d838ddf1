use crate::result::{RankedResult, SearchSource, assign_ranks, sort_and_rank};
use crate::tokenizer::tokenize;
use coderag_vector_store::{Document, SearchFilters};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Config {
    /// Term frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Document length normalization (0.0 - 1.0)
    #[serde(default = "default_b")]
    pub b: f32,

    /// Added inside the IDF logarithm and used to floor non-positive IDF values
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_epsilon() -> f32 {
    0.25
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            epsilon: default_epsilon(),
        }
    }
}

impl Bm25Config {
    pub fn validate(&self) -> Result<(), String> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(format!("bm25.k1 must be >= 0, got {}", self.k1));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(format!("bm25.b must be in [0.0, 1.0], got {}", self.b));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!("bm25.epsilon must be >= 0, got {}", self.epsilon));
        }
        Ok(())
    }
}

/// Inverted index over the indexed subset of the corpus.
///
/// Document references are positions in the engine's corpus vector.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    /// term -> document -> raw term frequency
    postings: HashMap<String, Vec<(usize, u32)>>,
    idf: HashMap<String, f32>,
    /// document -> token length
    document_lengths: HashMap<usize, usize>,
    average_document_length: f32,
    skipped_documents: usize,
}

impl InvertedIndex {
    fn build(documents: &[Document], config: &Bm25Config) -> Self {
        let mut index = InvertedIndex::default();
        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut total_length = 0usize;

        for (position, document) in documents.iter().enumerate() {
            if let Err(reason) = document.validate() {
                warn!("Skipping document '{}' while indexing: {reason}", document.id);
                index.skipped_documents += 1;
                continue;
            }
            if !seen_ids.insert(document.id.as_str()) {
                warn!("Skipping duplicate document id '{}' while indexing", document.id);
                index.skipped_documents += 1;
                continue;
            }

            let tokens = tokenize(&document.content);
            total_length += tokens.len();
            index.document_lengths.insert(position, tokens.len());

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0) += 1;
            }
            for (term, frequency) in frequencies {
                index
                    .postings
                    .entry(term)
                    .or_default()
                    .push((position, frequency));
            }
        }

        let indexed = index.document_lengths.len();
        index.average_document_length = if indexed == 0 {
            0.0
        } else {
            total_length as f32 / indexed as f32
        };
        index.idf = compute_idf(&index.postings, indexed, config.epsilon);
        index
    }

    pub fn indexed_documents(&self) -> usize {
        self.document_lengths.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    pub fn average_document_length(&self) -> f32 {
        self.average_document_length
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    fn term_frequency_weight(&self, frequency: u32, position: usize, config: &Bm25Config) -> f32 {
        let frequency = frequency as f32;
        let length = self.document_lengths.get(&position).copied().unwrap_or(0) as f32;
        let relative_length = if self.average_document_length > 0.0 {
            length / self.average_document_length
        } else {
            0.0
        };
        let norm = config.k1 * (1.0 - config.b + config.b * relative_length);
        frequency * (config.k1 + 1.0) / (frequency + norm)
    }
}

/// `ln((N - df + 0.5) / (df + 0.5) + epsilon)` per term, with non-positive
/// values raised to `epsilon` times the mean IDF.
fn compute_idf(
    postings: &HashMap<String, Vec<(usize, u32)>>,
    document_count: usize,
    epsilon: f32,
) -> HashMap<String, f32> {
    let n = document_count as f32;
    let mut idf: HashMap<String, f32> = postings
        .iter()
        .map(|(term, docs)| {
            let df = docs.len() as f32;
            (term.clone(), ((n - df + 0.5) / (df + 0.5) + epsilon).ln())
        })
        .collect();

    if idf.is_empty() {
        return idf;
    }

    let average = idf.values().sum::<f32>() / idf.len() as f32;
    let floor = if average > 0.0 {
        epsilon * average
    } else {
        epsilon
    }
    .max(f32::EPSILON);

    for value in idf.values_mut() {
        if *value <= 0.0 {
            *value = floor;
        }
    }
    idf
}

/// Index lifecycle. `build_index` is the only way from `Stale` to `Fresh`.
#[derive(Debug)]
pub enum IndexState {
    Stale,
    Fresh(InvertedIndex),
}

impl IndexState {
    pub fn is_fresh(&self) -> bool {
        matches!(self, IndexState::Fresh(_))
    }
}

/// Corpus statistics reported by the lexical engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bm25Stats {
    /// Documents currently loaded, indexed or not
    pub total_documents: usize,
    pub indexed_documents: usize,
    pub skipped_documents: usize,
    pub vocabulary_size: usize,
    pub average_document_length: f32,
    pub k1: f32,
    pub b: f32,
    pub epsilon: f32,
    pub fresh: bool,
}

/// In-memory BM25 searcher over a replaceable corpus
#[derive(Debug)]
pub struct Bm25Engine {
    config: Bm25Config,
    documents: Vec<Document>,
    state: IndexState,
}

impl Default for Bm25Engine {
    fn default() -> Self {
        Self::new(Bm25Config::default())
    }
}

impl Bm25Engine {
    pub fn new(config: Bm25Config) -> Self {
        Self {
            config,
            documents: Vec::new(),
            state: IndexState::Stale,
        }
    }

    pub fn config(&self) -> &Bm25Config {
        &self.config
    }

    /// Change parameters; the index must be rebuilt if they differ
    pub fn set_config(&mut self, config: Bm25Config) {
        if self.config != config {
            self.config = config;
            self.state = IndexState::Stale;
        }
    }

    /// Replace the whole corpus
    pub fn set_documents(&mut self, documents: Vec<Document>) {
        info!("Replacing lexical corpus with {} documents", documents.len());
        self.documents = documents;
        self.state = IndexState::Stale;
    }

    /// Append to the corpus; the next build reprocesses everything
    pub fn add_documents(&mut self, documents: Vec<Document>) {
        info!("Appending {} documents to lexical corpus", documents.len());
        self.documents.extend(documents);
        self.state = IndexState::Stale;
    }

    /// Drop the corpus and the index
    pub fn clear(&mut self) {
        self.documents.clear();
        self.state = IndexState::Stale;
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    pub fn is_fresh(&self) -> bool {
        self.state.is_fresh()
    }

    /// Rebuild all index structures. No-op when already fresh.
    pub fn build_index(&mut self) {
        if self.state.is_fresh() {
            return;
        }
        let index = InvertedIndex::build(&self.documents, &self.config);
        info!(
            "Built BM25 index: {} documents, {} terms, {} skipped",
            index.indexed_documents(),
            index.vocabulary_size(),
            index.skipped_documents
        );
        self.state = IndexState::Fresh(index);
    }

    /// Search, building the index first if it is stale
    pub fn search(
        &mut self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Vec<RankedResult> {
        self.build_index();
        self.try_search(query, filters, top_k).unwrap_or_default()
    }

    /// Search without mutating. Returns `None` when the index is stale.
    pub fn try_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Option<Vec<RankedResult>> {
        let IndexState::Fresh(index) = &self.state else {
            return None;
        };

        let terms = tokenize(query);
        if terms.is_empty() || top_k == 0 || index.indexed_documents() == 0 {
            return Some(Vec::new());
        }

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &terms {
            let (Some(postings), Some(idf)) = (index.postings.get(term), index.idf.get(term)) else {
                continue;
            };
            for &(position, frequency) in postings {
                if !filters.matches(&self.documents[position]) {
                    continue;
                }
                let weight = index.term_frequency_weight(frequency, position, &self.config);
                *scores.entry(position).or_insert(0.0) += idf * weight;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by_key(|(position, _)| *position);

        let mut results: Vec<RankedResult> = ranked
            .into_iter()
            .map(|(position, score)| {
                let document = &self.documents[position];
                RankedResult::from_document(document, score, SearchSource::Lexical)
            })
            .collect();
        sort_and_rank(&mut results, top_k);

        debug!("BM25 search for '{query}' matched {} documents", results.len());
        Some(results)
    }

    /// Indexed documents passing `filters` in corpus order, each scored 1.0.
    /// Builds the index first if it is stale.
    pub fn list(&mut self, filters: &SearchFilters, top_k: usize) -> Vec<RankedResult> {
        self.build_index();
        self.try_list(filters, top_k).unwrap_or_default()
    }

    /// Listing without mutating. Returns `None` when the index is stale.
    pub fn try_list(&self, filters: &SearchFilters, top_k: usize) -> Option<Vec<RankedResult>> {
        let IndexState::Fresh(index) = &self.state else {
            return None;
        };

        let mut results: Vec<RankedResult> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(position, document)| {
                index.document_lengths.contains_key(position) && filters.matches(document)
            })
            .take(top_k)
            .map(|(_, document)| RankedResult::from_document(document, 1.0, SearchSource::Lexical))
            .collect();
        assign_ranks(&mut results);

        debug!("Listed {} documents for filters {filters:?}", results.len());
        Some(results)
    }

    /// Number of indexed documents containing `term` (0 while stale)
    pub fn document_frequency(&self, term: &str) -> usize {
        match &self.state {
            IndexState::Fresh(index) => index.document_frequency(term),
            IndexState::Stale => 0,
        }
    }

    pub fn stats(&self) -> Bm25Stats {
        let mut stats = Bm25Stats {
            total_documents: self.documents.len(),
            k1: self.config.k1,
            b: self.config.b,
            epsilon: self.config.epsilon,
            ..Default::default()
        };
        if let IndexState::Fresh(index) = &self.state {
            stats.indexed_documents = index.indexed_documents();
            stats.skipped_documents = index.skipped_documents;
            stats.vocabulary_size = index.vocabulary_size();
            stats.average_document_length = index.average_document_length();
            stats.fresh = true;
        }
        stats
    }
}
