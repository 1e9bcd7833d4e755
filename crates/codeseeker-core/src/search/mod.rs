//! Hybrid search engine with RRF fusion across vector, keyword, and
//! path/fuzzy signals.
//!
//! Each sub-query ranks candidates independently; fusion never compares raw
//! scores across sources (a cosine similarity and a BM25 score aren't on the
//! same scale) -- only each source's *rank* feeds reciprocal rank fusion.

pub mod context;
pub mod intent;

use crate::embedder::EmbeddingProvider;
use crate::error::CodeSeekerResult;
use crate::index::MetadataIndex;
use crate::types::{ScoreBreakdown, SearchResult};
use crate::vector::VectorStore;

pub use intent::QueryIntent;

/// A file is never snippeted past this size, regardless of query intent.
const MAX_SNIPPET_FILE_LINES: u32 = 1000;

/// Optional narrowing applied to candidates before fusion.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Only consider chunks whose file language matches.
    pub language: Option<crate::types::Language>,
    /// Only consider chunks whose file path starts with this prefix.
    pub path_prefix: Option<String>,
}

/// Why a search returned no results, for callers that want to distinguish
/// "nothing indexed yet" from "query genuinely had no matches".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The project has no indexed chunks at all.
    NotIndexed,
    /// The query matched nothing across all three signals.
    NoMatches,
    /// Matches existed but filters excluded every one of them.
    FiltersExcludedAll,
}

/// Result of a hybrid search call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SearchOutcome {
    /// Ranked results, empty if nothing matched.
    pub results: Vec<SearchResult>,
    /// Set only when `results` is empty.
    pub empty_reason: Option<EmptyReason>,
}

/// Hybrid search engine that fuses vector, text, and path signals via
/// reciprocal rank fusion.
pub struct SearchEngine {
    rrf_k: u32,
}

impl SearchEngine {
    /// Create a new search engine with the given RRF constant (spec default: 60).
    #[must_use]
    pub fn new(rrf_k: u32) -> Self {
        Self { rrf_k }
    }

    /// Execute a hybrid search query.
    ///
    /// 1. Embed the query (vector leg).
    /// 2. Run vector, text, and path sub-queries independently.
    /// 3. Fuse by RRF; ties broken `vector > text > path`.
    /// 4. Apply filters, truncate to `limit`, attach intent-sized snippets.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        index: &MetadataIndex,
        vector_store: &VectorStore,
        embedder: &dyn EmbeddingProvider,
        filters: &SearchFilters,
        query_intent: QueryIntent,
    ) -> CodeSeekerResult<SearchOutcome> {
        let stats = index.statistics()?;
        if stats.chunk_count == 0 {
            return Ok(SearchOutcome { results: Vec::new(), empty_reason: Some(EmptyReason::NotIndexed) });
        }

        let k_v = limit.max(10) * 3;
        let k_t = limit.max(10) * 3;
        let k_p = limit.max(10) * 2;

        // Run the three legs in parallel. Text and path each need their own
        // SQLite connection to do so: `MetadataIndex` wraps a
        // `rusqlite::Connection`, which is `Send` but not `Sync`, so it can't
        // be borrowed from two threads at once. Each replica is moved into
        // its closure rather than borrowed from the caller's `index`.
        let text_index = index.open_replica()?;
        let path_index = index.open_replica()?;
        let (vector_result, (text_result, path_result)) = rayon::join(
            || self.vector_leg(query, k_v, vector_store, embedder),
            || rayon::join(move || self.text_leg(query, k_t, &text_index), move || self.path_leg(query, k_p, &path_index)),
        );
        let vector_ranks = vector_result?;
        let text_ranks = text_result?;
        let path_ranks = path_result?;

        let mut breakdowns: std::collections::HashMap<i64, ScoreBreakdown> = std::collections::HashMap::new();
        for (chunk_id, rank) in &vector_ranks {
            breakdowns.entry(*chunk_id).or_default().semantic_rank = Some(*rank);
        }
        for (chunk_id, rank) in &text_ranks {
            breakdowns.entry(*chunk_id).or_default().keyword_rank = Some(*rank);
        }
        for (chunk_id, rank) in &path_ranks {
            breakdowns.entry(*chunk_id).or_default().path_rank = Some(*rank);
        }

        if breakdowns.is_empty() {
            return Ok(SearchOutcome { results: Vec::new(), empty_reason: Some(EmptyReason::NoMatches) });
        }

        for breakdown in breakdowns.values_mut() {
            breakdown.rrf_score = self.rrf_score(breakdown.semantic_rank, breakdown.keyword_rank, breakdown.path_rank);
        }

        let mut ranked: Vec<(i64, ScoreBreakdown)> = breakdowns.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.rrf_score
                .partial_cmp(&a.1.rrf_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| tie_break_key(&a.1).cmp(&tie_break_key(&b.1)))
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut results = Vec::with_capacity(limit);
        let mut filters_excluded_any = false;
        for (chunk_id, breakdown) in ranked {
            if results.len() >= limit {
                break;
            }
            let Some(chunk) = index.get_chunk(chunk_id)? else { continue };
            let Some(file) = index.get_file_by_id(chunk.file_id)? else { continue };
            let file_path = file.path.clone();

            if !passes_filters(&file, filters) {
                filters_excluded_any = true;
                continue;
            }

            let snippet = build_snippet(index, &chunk, query_intent)?;
            results.push(SearchResult {
                score: breakdown.rrf_score,
                score_breakdown: breakdown,
                chunk,
                file_path,
                snippet,
            });
        }

        if results.is_empty() && filters_excluded_any {
            return Ok(SearchOutcome { results, empty_reason: Some(EmptyReason::FiltersExcludedAll) });
        }

        Ok(SearchOutcome { results, empty_reason: None })
    }

    fn vector_leg(&self, query: &str, k: usize, vector_store: &VectorStore, embedder: &dyn EmbeddingProvider) -> CodeSeekerResult<Vec<(i64, u32)>> {
        if vector_store.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = embedder.embed_single(query)?;
        let hits = vector_store.search(&query_vector, k);
        Ok(hits.into_iter().enumerate().map(|(i, (chunk_id, _score))| (chunk_id, i as u32 + 1)).collect())
    }

    fn text_leg(&self, query: &str, k: usize, index: &MetadataIndex) -> CodeSeekerResult<Vec<(i64, u32)>> {
        let hits = index.text_search(query, k)?;
        Ok(hits.into_iter().enumerate().map(|(i, hit)| (hit.chunk_id, i as u32 + 1)).collect())
    }

    /// Substring/fuzzy match of the query against relative paths and symbol
    /// names, resolved down to a representative chunk per match: a file
    /// match resolves to that file's first chunk, a symbol match to the
    /// symbol's own chunk.
    fn path_leg(&self, query: &str, k: usize, index: &MetadataIndex) -> CodeSeekerResult<Vec<(i64, u32)>> {
        let mut candidates: Vec<(i64, usize)> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for symbol in index.search_symbols_by_substring(query, k)? {
            if let Some(chunk_id) = symbol.chunk_id {
                if seen.insert(chunk_id) {
                    candidates.push((chunk_id, match_distance(&symbol.name, query)));
                }
            }
        }
        for file in index.search_files_by_path_substring(query, k)? {
            let chunks = index.get_chunks_for_file(file.id)?;
            if let Some(first) = chunks.first() {
                if seen.insert(first.id) {
                    candidates.push((first.id, match_distance(&file.path.to_string_lossy(), query)));
                }
            }
        }

        candidates.sort_by_key(|(_, distance)| *distance);
        candidates.truncate(k);
        Ok(candidates.into_iter().enumerate().map(|(i, (chunk_id, _))| (chunk_id, i as u32 + 1)).collect())
    }

    /// RRF fusion across up to three signal ranks; missing signals contribute 0.
    #[must_use]
    pub fn rrf_score(&self, vector_rank: Option<u32>, text_rank: Option<u32>, path_rank: Option<u32>) -> f64 {
        let k = f64::from(self.rrf_k);
        let contribution = |rank: Option<u32>| rank.map_or(0.0, |r| 1.0 / (k + f64::from(r)));
        contribution(vector_rank) + contribution(text_rank) + contribution(path_rank)
    }
}

/// Sort key for RRF ties: lower is earlier. Favors a candidate with a vector
/// rank over one without, then text, then path, matching the spec's fixed
/// `vector > text > path` tie-break order.
fn tie_break_key(breakdown: &ScoreBreakdown) -> (u8, u8, u8) {
    (u8::from(breakdown.semantic_rank.is_none()), u8::from(breakdown.keyword_rank.is_none()), u8::from(breakdown.path_rank.is_none()))
}

/// Closer to 0 is a better match: exact (case-insensitive) match first, then
/// shorter haystacks (less to disambiguate), then match position.
fn match_distance(haystack: &str, needle: &str) -> usize {
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    if haystack_lower == needle_lower {
        return 0;
    }
    match haystack_lower.find(&needle_lower) {
        Some(pos) => 1 + pos + haystack.len(),
        None => usize::MAX,
    }
}

fn passes_filters(file: &crate::types::FileInfo, filters: &SearchFilters) -> bool {
    if let Some(prefix) = &filters.path_prefix {
        if !file.path.to_string_lossy().starts_with(prefix.as_str()) {
            return false;
        }
    }
    if let Some(language) = filters.language {
        if file.language != language {
            return false;
        }
    }
    true
}

fn build_snippet(index: &MetadataIndex, chunk: &crate::types::Chunk, query_intent: QueryIntent) -> CodeSeekerResult<Option<String>> {
    let budget = query_intent.snippet_line_budget();
    if budget == 0 {
        return Ok(None);
    }
    let file_lines = index.estimate_file_line_count(chunk.file_id)?;
    if file_lines > MAX_SNIPPET_FILE_LINES {
        return Ok(None);
    }
    let truncated: String = chunk.content.lines().take(budget).collect::<Vec<_>>().join("\n");
    Ok(Some(truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_score_sums_available_signal_contributions() {
        let engine = SearchEngine::new(60);
        let score = engine.rrf_score(Some(1), Some(1), Some(1));
        let expected = 3.0 / 61.0;
        assert!((score - expected).abs() < 1e-10);
    }

    #[test]
    fn rrf_score_vector_only() {
        let engine = SearchEngine::new(60);
        let score = engine.rrf_score(Some(1), None, None);
        assert!((score - 1.0 / 61.0).abs() < 1e-10);
    }

    #[test]
    fn rrf_score_no_signal_is_zero() {
        let engine = SearchEngine::new(60);
        assert_eq!(engine.rrf_score(None, None, None), 0.0);
    }

    #[test]
    fn rrf_higher_rank_gets_higher_score() {
        let engine = SearchEngine::new(60);
        let best = engine.rrf_score(Some(1), Some(1), Some(1));
        let worst = engine.rrf_score(Some(10), Some(10), Some(10));
        assert!(best > worst);
    }

    #[test]
    fn tie_break_prefers_vector_then_text_then_path() {
        let vector_only = ScoreBreakdown { semantic_rank: Some(1), ..Default::default() };
        let text_only = ScoreBreakdown { keyword_rank: Some(1), ..Default::default() };
        let path_only = ScoreBreakdown { path_rank: Some(1), ..Default::default() };
        assert!(tie_break_key(&vector_only) < tie_break_key(&text_only));
        assert!(tie_break_key(&text_only) < tie_break_key(&path_only));
    }

    #[test]
    fn match_distance_ranks_exact_match_first() {
        assert!(match_distance("login", "login") < match_distance("user_login_handler", "login"));
    }
}
