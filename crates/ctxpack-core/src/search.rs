//! Query search over a [`RepoMap`] with heuristic ranking.
//!
//! Queries are tokenized into lowercase terms. A chunk matches when any
//! enabled channel matches: symbol names, the file path, or (opt-in) the
//! full content, which must contain every term.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ctxpack_config::SearchConfig;

use crate::fuzzy::fuzzy_match;
use crate::model::{ChunkType, CodeChunk, RepoMap, ScoredChunk};

const EXACT_SYMBOL_BONUS: f64 = 50.0;
const SYMBOL_SUBSTRING_BONUS: f64 = 20.0;
const SYMBOL_TERM_BONUS: f64 = 10.0;
const FILENAME_QUERY_BONUS: f64 = 15.0;
const FILENAME_TERM_BONUS: f64 = 5.0;
const ENTRY_POINT_BONUS: f64 = 10.0;
const CORE_MODULE_BONUS: f64 = 5.0;
const PATH_TERM_BONUS: f64 = 2.0;
const IMPORTANCE_WEIGHT: f64 = 10.0;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "where", "which",
    "with",
];

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("NON_WORD_RE regex should compile"));

/// Which channels to match on, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub search_symbols: bool,
    pub search_paths: bool,
    /// Require every term in the content. Reads all content; off by default.
    pub search_content: bool,
    /// Approximate matching for symbols and filenames.
    pub fuzzy: bool,
    pub max_distance: usize,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Restrict matches to these chunk types.
    pub chunk_types: Option<Vec<ChunkType>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_symbols: true,
            search_paths: true,
            search_content: false,
            fuzzy: false,
            max_distance: 2,
            limit: None,
            chunk_types: None,
        }
    }
}

impl SearchOptions {
    /// Options seeded from configured defaults.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            search_content: config.search_content,
            fuzzy: config.fuzzy,
            max_distance: config.max_distance,
            limit: Some(config.limit),
            ..Self::default()
        }
    }
}

/// Split a query into lowercase search terms.
///
/// Non-word characters are stripped, single characters and stop words are
/// dropped.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| NON_WORD_RE.replace_all(token, "").to_lowercase())
        .filter(|term| term.chars().count() > 1 && !STOP_WORDS.contains(&term.as_str()))
        .collect()
}

/// Chunks matching `query`, in map order.
pub fn search<'a>(map: &'a RepoMap, query: &str, options: &SearchOptions) -> Vec<&'a CodeChunk> {
    let terms = tokenize_query(query);
    if terms.is_empty() {
        return Vec::new();
    }
    let limit = options.limit.unwrap_or(usize::MAX);
    map.chunks
        .values()
        .filter(|chunk| matches_chunk(chunk, &terms, options))
        .take(limit)
        .collect()
}

/// Matching chunks with scores, highest first.
///
/// Equal scores keep map order.
pub fn search_ranked(map: &RepoMap, query: &str, options: &SearchOptions) -> Vec<ScoredChunk> {
    let terms = tokenize_query(query);
    if terms.is_empty() {
        return Vec::new();
    }
    let query = query.trim().to_lowercase();

    let mut scored: Vec<ScoredChunk> = map
        .chunks
        .values()
        .filter(|chunk| matches_chunk(chunk, &terms, options))
        .map(|chunk| ScoredChunk {
            score: score(chunk, &query, &terms),
            chunk: chunk.clone(),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(limit) = options.limit {
        scored.truncate(limit);
    }

    debug!(query = %query, terms = terms.len(), hits = scored.len(), "Ranked search");
    scored
}

fn matches_chunk(chunk: &CodeChunk, terms: &[String], options: &SearchOptions) -> bool {
    if let Some(types) = &options.chunk_types
        && !types.contains(&chunk.chunk_type)
    {
        return false;
    }

    (options.search_symbols && matches_symbols(chunk, terms, options))
        || (options.search_paths && matches_path(chunk, terms, options))
        || (options.search_content && matches_content(chunk, terms))
}

fn matches_symbols(chunk: &CodeChunk, terms: &[String], options: &SearchOptions) -> bool {
    chunk.symbols.iter().any(|symbol| {
        let symbol = symbol.to_lowercase();
        terms.iter().any(|term| {
            symbol.contains(term.as_str())
                || (options.fuzzy && fuzzy_match(&symbol, term, options.max_distance))
        })
    })
}

fn matches_path(chunk: &CodeChunk, terms: &[String], options: &SearchOptions) -> bool {
    let path = chunk.file_path.to_lowercase();
    let stem = file_stem(chunk.file_name()).to_lowercase();
    terms.iter().any(|term| {
        path.contains(term.as_str())
            || (options.fuzzy && fuzzy_match(&stem, term, options.max_distance))
    })
}

fn matches_content(chunk: &CodeChunk, terms: &[String]) -> bool {
    let content = chunk.content.to_lowercase();
    terms.iter().all(|term| content.contains(term.as_str()))
}

/// Heuristic ranking score. `query` is the trimmed, lowercased raw query.
fn score(chunk: &CodeChunk, query: &str, terms: &[String]) -> f64 {
    let mut score = chunk.importance * IMPORTANCE_WEIGHT;

    for symbol in &chunk.symbols {
        let symbol = symbol.to_lowercase();
        if symbol == query {
            score += EXACT_SYMBOL_BONUS;
        } else if symbol.contains(query) {
            score += SYMBOL_SUBSTRING_BONUS;
        } else {
            score += SYMBOL_TERM_BONUS * count_contained(&symbol, terms);
        }
    }

    let file_name = chunk.file_name().to_lowercase();
    if file_name.contains(query) {
        score += FILENAME_QUERY_BONUS;
    } else {
        score += FILENAME_TERM_BONUS * count_contained(&file_name, terms);
    }

    score += match chunk.chunk_type {
        ChunkType::EntryPoint => ENTRY_POINT_BONUS,
        ChunkType::CoreModule => CORE_MODULE_BONUS,
        _ => 0.0,
    };

    score + PATH_TERM_BONUS * count_contained(&chunk.file_path.to_lowercase(), terms)
}

fn count_contained(haystack: &str, terms: &[String]) -> f64 {
    terms.iter().filter(|t| haystack.contains(t.as_str())).count() as f64
}

fn file_stem(file_name: &str) -> &str {
    match file_name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}
