use crate::result::{RankedResult, SearchSource, assign_ranks, sort_and_rank};
use crate::tokenizer::tokenize;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Reorders one or more ranked lists into a single list
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, lists: &[Vec<RankedResult>], top_k: usize) -> Vec<RankedResult>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Relevance model for cross-encoder style reranking, scoring one
/// (query, content) pair at a time
pub trait PairScorer: Send + Sync {
    fn score(&self, query: &str, content: &str) -> f32;
}

/// Deduplicate across lists by id, keeping the first occurrence of each
pub fn merge_unique(lists: &[Vec<RankedResult>]) -> Vec<RankedResult> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::new();
    for result in lists.iter().flatten() {
        if seen.insert(result.id.as_str()) {
            merged.push(result.clone());
        }
    }
    merged
}

/// Min-max scale scores into [0, 1]. A list whose scores are all equal maps
/// every entry to 0.5.
pub fn min_max_normalize(results: &[RankedResult]) -> Vec<f32> {
    let (min, max) = results
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), result| {
            (min.min(result.score), max.max(result.score))
        });
    let range = max - min;
    results
        .iter()
        .map(|result| {
            if range > f32::EPSILON {
                (result.score - min) / range
            } else {
                0.5
            }
        })
        .collect()
}

/// Normalize each list to [0, 1], scale it by its weight and sum per id,
/// best first. Normalizing first keeps unbounded BM25 scores from drowning
/// out cosine similarities.
pub fn weighted_union(
    vector_results: &[RankedResult],
    lexical_results: &[RankedResult],
    vector_weight: f32,
    lexical_weight: f32,
) -> Vec<RankedResult> {
    let mut scores: IndexMap<&str, (f32, &RankedResult)> = IndexMap::new();

    for (results, weight) in [(vector_results, vector_weight), (lexical_results, lexical_weight)] {
        let normalized = min_max_normalize(results);
        for (result, score) in results.iter().zip(normalized) {
            let weighted = score * weight;
            scores
                .entry(result.id.as_str())
                .and_modify(|entry| entry.0 += weighted)
                .or_insert((weighted, result));
        }
    }

    let mut combined: Vec<RankedResult> = scores
        .into_values()
        .map(|(score, result)| result.rescored(score, SearchSource::Hybrid))
        .collect();
    let len = combined.len();
    sort_and_rank(&mut combined, len);
    combined
}

/// Reciprocal Rank Fusion.
///
/// RRF(d) = Σ 1 / (k + r(d) + 1) over every list containing d, where r is the
/// zero-based rank. Only positions matter, so differently scaled lists fuse
/// without normalization.
#[derive(Debug, Clone, Copy)]
pub struct ReciprocalRankFusion {
    pub k: f32,
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl Reranker for ReciprocalRankFusion {
    fn rerank(&self, _query: &str, lists: &[Vec<RankedResult>], top_k: usize) -> Vec<RankedResult> {
        let mut scores: IndexMap<&str, (f32, &RankedResult)> = IndexMap::new();

        for list in lists {
            for (rank, result) in list.iter().enumerate() {
                let contribution = 1.0 / (self.k + rank as f32 + 1.0);
                scores
                    .entry(result.id.as_str())
                    .and_modify(|entry| entry.0 += contribution)
                    .or_insert((contribution, result));
            }
        }

        let mut fused: Vec<RankedResult> = scores
            .into_values()
            .map(|(score, result)| result.rescored(score, SearchSource::Hybrid))
            .collect();
        sort_and_rank(&mut fused, top_k);

        debug!("RRF produced {} results", fused.len());
        fused
    }

    fn name(&self) -> &'static str {
        "reciprocal_rank"
    }
}

/// Token-set similarity used by [`LexicalOverlapReranker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMeasure {
    /// |q ∩ c| / |q ∪ c|
    #[default]
    Jaccard,
    /// |q ∩ c| / |q|
    QueryCoverage,
}

impl SimilarityMeasure {
    fn similarity(self, query: &HashSet<String>, content: &HashSet<String>) -> f32 {
        let intersection = query.intersection(content).count() as f32;
        let denominator = match self {
            SimilarityMeasure::Jaccard => query.union(content).count(),
            SimilarityMeasure::QueryCoverage => query.len(),
        };
        if denominator == 0 {
            0.0
        } else {
            intersection / denominator as f32
        }
    }
}

/// Blends the existing score with query/content token overlap
#[derive(Debug, Clone, Copy)]
pub struct LexicalOverlapReranker {
    pub similarity_weight: f32,
    pub measure: SimilarityMeasure,
}

impl Default for LexicalOverlapReranker {
    fn default() -> Self {
        Self {
            similarity_weight: 0.3,
            measure: SimilarityMeasure::Jaccard,
        }
    }
}

impl Reranker for LexicalOverlapReranker {
    fn rerank(&self, query: &str, lists: &[Vec<RankedResult>], top_k: usize) -> Vec<RankedResult> {
        let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
        let w = self.similarity_weight;

        let mut results: Vec<RankedResult> = merge_unique(lists)
            .into_iter()
            .map(|mut result| {
                let content_tokens: HashSet<String> =
                    tokenize(&result.content).into_iter().collect();
                let similarity = self.measure.similarity(&query_tokens, &content_tokens);
                result.score = (1.0 - w) * result.score + w * similarity;
                result.source = SearchSource::Hybrid;
                result
            })
            .collect();
        sort_and_rank(&mut results, top_k);
        results
    }

    fn name(&self) -> &'static str {
        "lexical_overlap"
    }
}

/// Pass-through ranking: merge, dedupe and re-sort by the existing score
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBasedReranker;

impl Reranker for ScoreBasedReranker {
    fn rerank(&self, _query: &str, lists: &[Vec<RankedResult>], top_k: usize) -> Vec<RankedResult> {
        let mut results = merge_unique(lists);
        sort_and_rank(&mut results, top_k);
        results
    }

    fn name(&self) -> &'static str {
        "score_based"
    }
}

/// Scores every merged candidate with an injected [`PairScorer`]
pub struct CrossEncoderReranker {
    scorer: Arc<dyn PairScorer>,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn PairScorer>) -> Self {
        Self { scorer }
    }
}

impl Reranker for CrossEncoderReranker {
    fn rerank(&self, query: &str, lists: &[Vec<RankedResult>], top_k: usize) -> Vec<RankedResult> {
        let mut results: Vec<RankedResult> = merge_unique(lists)
            .into_iter()
            .map(|result| {
                let score = self.scorer.score(query, &result.content);
                result.rescored(score, SearchSource::Hybrid)
            })
            .collect();
        sort_and_rank(&mut results, top_k);
        results
    }

    fn name(&self) -> &'static str {
        "cross_encoder"
    }
}

/// What kind of retrieval a query is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Semantic,
    Keyword,
    Mixed,
}

const KEYWORD_INDICATORS: &[&str] = &[
    "function", "class", "method", "variable", "import", "def", "struct",
];
const SEMANTIC_INDICATORS: &[&str] = &[
    "how to", "what is", "explain", "implement", "algorithm", "pattern",
];

impl QueryKind {
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();
        let count = |indicators: &[&str]| indicators.iter().filter(|i| query.contains(*i)).count();
        let keyword = count(KEYWORD_INDICATORS);
        let semantic = count(SEMANTIC_INDICATORS);

        if semantic > keyword {
            QueryKind::Semantic
        } else if keyword > semantic {
            QueryKind::Keyword
        } else {
            QueryKind::Mixed
        }
    }
}

/// Resolves disagreement between the vector list (first) and the lexical
/// list (second).
///
/// Every document gets the mean of its scores across lists. Documents in the
/// top five of one list but not the other are scaled by how well that list
/// suits the query: 1.0 for the favoured side, 0.7 for the other, 0.8 when
/// the query is mixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolutionReranker;

const CONFLICT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    VectorOnly,
    LexicalOnly,
}

impl ConflictResolutionReranker {
    fn factor(kind: QueryKind, conflict: Conflict) -> f32 {
        match (kind, conflict) {
            (QueryKind::Semantic, Conflict::VectorOnly)
            | (QueryKind::Keyword, Conflict::LexicalOnly) => 1.0,
            (QueryKind::Semantic, Conflict::LexicalOnly)
            | (QueryKind::Keyword, Conflict::VectorOnly) => 0.7,
            (QueryKind::Mixed, _) => 0.8,
        }
    }
}

impl Reranker for ConflictResolutionReranker {
    fn rerank(&self, query: &str, lists: &[Vec<RankedResult>], top_k: usize) -> Vec<RankedResult> {
        let empty = Vec::new();
        let vector = lists.first().unwrap_or(&empty);
        let lexical = lists.get(1).unwrap_or(&empty);

        let vector_top = top_ids(vector);
        let lexical_top = top_ids(lexical);

        let mut conflicts: IndexMap<String, Conflict> = IndexMap::new();
        for id in vector_top.difference(&lexical_top) {
            conflicts.insert(id.clone(), Conflict::VectorOnly);
        }
        for id in lexical_top.difference(&vector_top) {
            conflicts.insert(id.clone(), Conflict::LexicalOnly);
        }

        let kind = QueryKind::classify(query);
        debug!(
            "Conflict resolution: {} conflicts, query kind {kind:?}",
            conflicts.len()
        );

        let mut grouped: IndexMap<&str, (f32, usize, &RankedResult)> = IndexMap::new();
        for result in lists.iter().flatten() {
            grouped
                .entry(result.id.as_str())
                .and_modify(|entry| {
                    entry.0 += result.score;
                    entry.1 += 1;
                    if result.score > entry.2.score {
                        entry.2 = result;
                    }
                })
                .or_insert((result.score, 1, result));
        }

        let mut results: Vec<RankedResult> = grouped
            .into_iter()
            .map(|(id, (sum, count, best))| {
                let mut score = sum / count as f32;
                if let Some(conflict) = conflicts.get(id) {
                    score *= Self::factor(kind, *conflict);
                }
                best.rescored(score, SearchSource::Hybrid)
            })
            .collect();
        sort_and_rank(&mut results, top_k);
        results
    }

    fn name(&self) -> &'static str {
        "conflict_resolution"
    }
}

fn top_ids(list: &[RankedResult]) -> HashSet<String> {
    list.iter()
        .take(CONFLICT_WINDOW)
        .map(|r| r.id.clone())
        .collect()
}

/// Keep list order, only truncate and renumber. Used when reranking is off
/// but a final list still has to be cut.
pub(crate) fn truncate_ranked(mut results: Vec<RankedResult>, top_k: usize) -> Vec<RankedResult> {
    results.truncate(top_k);
    assign_ranks(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderag_vector_store::Document;
    use pretty_assertions::assert_eq;

    fn create_result(id: &str, content: &str, score: f32, source: SearchSource) -> RankedResult {
        RankedResult::from_document(&Document::new(id, content), score, source)
    }

    fn ranked(ids: &[&str], source: SearchSource) -> Vec<RankedResult> {
        let len = ids.len() as f32;
        ids.iter()
            .enumerate()
            .map(|(i, id)| create_result(id, "text", len - i as f32, source).with_rank(i))
            .collect()
    }

    fn ids(results: &[RankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_rrf_contributions() {
        let vector = ranked(&["a", "b"], SearchSource::Vector);
        let lexical = ranked(&["b", "c"], SearchSource::Lexical);

        let fused = ReciprocalRankFusion::default().rerank("q", &[vector, lexical], 10);

        assert_eq!(ids(&fused), vec!["b", "a", "c"]);
        let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].score - expected_b).abs() < 1e-6);
        assert!((fused[1].score - 1.0 / 61.0).abs() < 1e-6);
        assert_eq!(fused[0].source, SearchSource::Hybrid);
        assert_eq!(fused[2].rank, 2);
    }

    #[test]
    fn test_rrf_of_list_with_itself_keeps_order() {
        let list = ranked(&["x", "y", "z", "w"], SearchSource::Vector);
        let rrf = ReciprocalRankFusion::default();

        let single = rrf.rerank("q", std::slice::from_ref(&list), 10);
        let doubled = rrf.rerank("q", &[list.clone(), list], 10);

        assert_eq!(ids(&single), ids(&doubled));
        for (one, two) in single.iter().zip(&doubled) {
            assert!((two.score - 2.0 * one.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rrf_truncates() {
        let list = ranked(&["a", "b", "c"], SearchSource::Lexical);
        let fused = ReciprocalRankFusion::default().rerank("q", &[list], 2);
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_unique_keeps_first_seen() {
        let first = vec![
            create_result("a", "first a", 0.9, SearchSource::Vector),
            create_result("b", "first b", 0.8, SearchSource::Vector),
        ];
        let second = vec![
            create_result("b", "second b", 7.0, SearchSource::Lexical),
            create_result("c", "second c", 3.0, SearchSource::Lexical),
        ];

        let merged = merge_unique(&[first, second]);
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged[1].content, "first b");
    }

    #[test]
    fn test_weighted_union_sums_per_id() {
        let vector = vec![create_result("a", "text", 0.8, SearchSource::Vector)];
        let lexical = vec![
            create_result("a", "text", 1.0, SearchSource::Lexical),
            create_result("b", "text", 2.0, SearchSource::Lexical),
        ];

        let combined = weighted_union(&vector, &lexical, 0.6, 0.4);

        // vector a -> 0.5 (single entry); lexical a -> 0.0, b -> 1.0
        assert_eq!(ids(&combined), vec!["b", "a"]);
        assert!((combined[0].score - 0.4).abs() < 1e-6);
        assert!((combined[1].score - 0.3).abs() < 1e-6);
        assert!(combined.iter().all(|r| r.source == SearchSource::Hybrid));
    }

    #[test]
    fn test_weighted_union_respects_weights_across_score_scales() {
        let vector = vec![
            create_result("vec_best", "text", 0.95, SearchSource::Vector),
            create_result("vec_low", "text", 0.2, SearchSource::Vector),
        ];
        let lexical = vec![
            create_result("lex_best", "text", 8.88, SearchSource::Lexical),
            create_result("lex_low", "text", 1.0, SearchSource::Lexical),
        ];

        let combined = weighted_union(&vector, &lexical, 0.9, 0.3);

        assert_eq!(ids(&combined), vec!["vec_best", "lex_best", "vec_low", "lex_low"]);
        assert!((combined[0].score - 0.9).abs() < 1e-6);
        assert!((combined[1].score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_min_max_normalize() {
        assert!(min_max_normalize(&[]).is_empty());

        let flat = ranked(&["a", "b"], SearchSource::Lexical)
            .into_iter()
            .map(|r| r.rescored(3.0, SearchSource::Lexical))
            .collect::<Vec<_>>();
        assert_eq!(min_max_normalize(&flat), vec![0.5, 0.5]);

        let spread = ranked(&["a", "b", "c"], SearchSource::Lexical);
        assert_eq!(min_max_normalize(&spread), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_weighted_union_vector_only_reproduces_vector_order() {
        let vector = ranked(&["v1", "v2", "v3"], SearchSource::Vector);
        let lexical = ranked(&["l1", "v3", "l2"], SearchSource::Lexical);

        let combined = weighted_union(&vector, &lexical, 1.0, 0.0);
        let head: Vec<&str> = ids(&combined).into_iter().take(3).collect();
        assert_eq!(head, vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_lexical_overlap_blend() {
        let lists = vec![vec![
            create_result("a", "render widget tree", 0.9, SearchSource::Hybrid),
            create_result("b", "retry network request", 0.8, SearchSource::Hybrid),
        ]];
        let reranker = LexicalOverlapReranker {
            similarity_weight: 0.5,
            measure: SimilarityMeasure::QueryCoverage,
        };

        let results = reranker.rerank("retry request", &lists, 10);

        assert_eq!(ids(&results), vec!["b", "a"]);
        assert!((results[0].score - (0.5 * 0.8 + 0.5 * 1.0)).abs() < 1e-6);
        assert!((results[1].score - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_jaccard_similarity() {
        let query = HashSet::from(["alpha".to_string(), "beta".to_string()]);
        let content = HashSet::from([
            "beta".to_string(),
            "gamma".to_string(),
            "delta".to_string(),
        ]);

        assert_eq!(SimilarityMeasure::Jaccard.similarity(&query, &content), 0.25);
        assert_eq!(SimilarityMeasure::QueryCoverage.similarity(&query, &content), 0.5);
        assert_eq!(
            SimilarityMeasure::Jaccard.similarity(&HashSet::new(), &HashSet::new()),
            0.0
        );
    }

    #[test]
    fn test_score_based_resorts_merged() {
        let lists = vec![
            vec![create_result("a", "text", 0.2, SearchSource::Hybrid)],
            vec![
                create_result("b", "text", 0.9, SearchSource::Hybrid),
                create_result("a", "text", 5.0, SearchSource::Hybrid),
            ],
        ];

        let results = ScoreBasedReranker.rerank("q", &lists, 10);
        assert_eq!(ids(&results), vec!["b", "a"]);
        assert_eq!(results[1].score, 0.2);
    }

    struct LengthScorer;

    impl PairScorer for LengthScorer {
        fn score(&self, _query: &str, content: &str) -> f32 {
            content.len() as f32
        }
    }

    #[test]
    fn test_cross_encoder_uses_scorer() {
        let lists = vec![vec![
            create_result("short", "ab", 0.9, SearchSource::Vector),
            create_result("long", "abcdef", 0.1, SearchSource::Vector),
        ]];

        let results = CrossEncoderReranker::new(Arc::new(LengthScorer)).rerank("q", &lists, 10);
        assert_eq!(ids(&results), vec!["long", "short"]);
        assert_eq!(results[0].score, 6.0);
    }

    #[test]
    fn test_query_classification() {
        assert_eq!(QueryKind::classify("how to implement retries"), QueryKind::Semantic);
        assert_eq!(QueryKind::classify("parse function import"), QueryKind::Keyword);
        assert_eq!(QueryKind::classify("database pool"), QueryKind::Mixed);
    }

    #[test]
    fn test_conflict_resolution_prefers_matching_side() {
        let vector = vec![create_result("v", "text", 0.9, SearchSource::Vector)];
        let lexical = vec![create_result("l", "text", 0.9, SearchSource::Lexical)];
        let lists = [vector, lexical];

        let keyword = ConflictResolutionReranker.rerank("find function", &lists, 10);
        assert_eq!(ids(&keyword), vec!["l", "v"]);
        assert!((keyword[1].score - 0.63).abs() < 1e-6);

        let semantic = ConflictResolutionReranker.rerank("explain caching", &lists, 10);
        assert_eq!(ids(&semantic), vec!["v", "l"]);

        let mixed = ConflictResolutionReranker.rerank("cache", &lists, 10);
        assert!(mixed.iter().all(|r| (r.score - 0.72).abs() < 1e-6));
    }

    #[test]
    fn test_conflict_resolution_averages_shared_documents() {
        let vector = vec![create_result("a", "text", 0.4, SearchSource::Vector)];
        let lexical = vec![create_result("a", "text", 2.0, SearchSource::Lexical)];

        let results = ConflictResolutionReranker.rerank("q", &[vector, lexical], 10);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.2).abs() < 1e-6);
    }
}
