#![deny(unsafe_code)]

//! ctxpack core: repository analysis and budgeted context selection.
//!
//! The analyzer walks a source tree into a [`RepoMap`] of scored, classified
//! chunks with a dependency graph. The selection engine packs a subset of
//! that map into a token budget, and the search engine ranks chunks against
//! free-text queries. [`ContextEngine`] ties them to one configured root.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future: the standard return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are **not**
/// object-safe. Traits consumed via `&dyn Trait` must return a concrete
/// `Pin<Box<dyn Future>>` instead.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Repository walk, classification, extraction, and the repo map cache.
pub mod analyzer;
/// Single-root facade over analysis, selection, and search.
pub mod engine;
/// Levenshtein distance and fuzzy matching.
pub mod fuzzy;
/// Glob patterns compiled to anchored regexes.
pub mod glob;
/// Chunk, repo map, and result types.
pub mod model;
/// Query tokenization, matching, and ranking.
pub mod search;
/// Strategy-driven selection, lookup boosting, and expansion.
pub mod selection;
/// Character-ratio token estimation.
pub mod tokens;

pub use analyzer::cache::{Clock, ManualClock, RepoMapCache, SystemClock};
pub use analyzer::extract::{ExtractorRegistry, SymbolExtractor};
pub use analyzer::{AnalyzeError, RepoAnalyzer};
pub use engine::ContextEngine;
pub use glob::{GlobError, GlobMatcher};
pub use model::{
    ChunkType, CodeChunk, EnhancedContextResult, LookupEnhancement, RepoMap, ScoredChunk,
    SelectionResult, SelectionStats,
};
pub use search::{SearchOptions, search, search_ranked};
pub use selection::expand::{ExpandDirection, ExpansionOptions, ExpansionResult, expand};
pub use selection::lookup::{
    EnhancedSelectionOptions, Location, LookupError, Position, ReferenceLookup, select_with_lookup,
};
pub use selection::packing::{TokenBudget, assemble_context};
pub use selection::{SelectionOptions, SelectionStrategy, select};
pub use tokens::TokenEstimator;
