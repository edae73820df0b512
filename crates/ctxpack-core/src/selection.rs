//! Budgeted, strategy-driven subsets of a [`RepoMap`].
//!
//! A selection filters the repo map's chunks, optionally scores them against
//! a free-text task, orders them by a [`SelectionStrategy`], and packs them
//! greedily into a token budget after any pinned and priority files.
//!
//! Importance boosts applied during selection are request-scoped: candidates
//! carry an effective importance computed from the cached chunk, and selected
//! chunks are copies. The cached [`RepoMap`] is never mutated.

pub mod expand;
pub mod lookup;
pub mod packing;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ctxpack_config::SelectionConfig;

use crate::model::{ChunkType, CodeChunk, RepoMap, SelectionResult};

use self::packing::TokenBudget;

/// Only the start of a file is scanned for task words.
const RELEVANCE_CONTENT_PREFIX: usize = 2000;

const PATH_MATCH_WEIGHT: f64 = 0.3;
const SYMBOL_MATCH_WEIGHT: f64 = 0.2;
const CONTENT_MATCH_WEIGHT: f64 = 0.1;

/// Ordering policy applied to candidates before packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Descending importance.
    #[default]
    ImportanceFirst,
    /// Descending task relevance, importance within 0.1-wide relevance bands.
    RelevanceFirst,
    /// Round-robin across directories, most important first within each.
    BreadthFirst,
    /// Entry points first, then descending importance.
    DepthFirst,
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::ImportanceFirst => write!(f, "importance_first"),
            SelectionStrategy::RelevanceFirst => write!(f, "relevance_first"),
            SelectionStrategy::BreadthFirst => write!(f, "breadth_first"),
            SelectionStrategy::DepthFirst => write!(f, "depth_first"),
        }
    }
}

impl std::str::FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "importance_first" => Ok(SelectionStrategy::ImportanceFirst),
            "relevance_first" => Ok(SelectionStrategy::RelevanceFirst),
            "breadth_first" => Ok(SelectionStrategy::BreadthFirst),
            "depth_first" => Ok(SelectionStrategy::DepthFirst),
            other => Err(format!("unknown selection strategy: {other:?}")),
        }
    }
}

/// Parameters of a selection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Hard token ceiling for the selection.
    pub max_tokens: u32,
    /// Free-text task used for relevance scoring.
    pub task: Option<String>,
    /// Ids placed first, in order, when they fit.
    pub priority_files: Vec<String>,
    /// Candidates below this importance are dropped.
    pub min_importance: f64,
    pub include_types: bool,
    pub include_tests: bool,
    pub strategy: SelectionStrategy,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            task: None,
            priority_files: Vec::new(),
            min_importance: 0.0,
            include_types: true,
            include_tests: false,
            strategy: SelectionStrategy::ImportanceFirst,
        }
    }
}

impl SelectionOptions {
    /// Options seeded from configured defaults.
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            task: None,
            priority_files: Vec::new(),
            min_importance: config.min_importance,
            include_types: config.include_types,
            include_tests: config.include_tests,
            strategy: config.strategy.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "Unknown selection strategy; using importance_first");
                SelectionStrategy::default()
            }),
        }
    }

    /// Builder-style token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder-style task text.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Builder-style strategy.
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder-style priority files.
    pub fn with_priority_files(mut self, files: Vec<String>) -> Self {
        self.priority_files = files;
        self
    }
}

/// A chunk under consideration, with request-scoped scores.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    chunk: &'a CodeChunk,
    importance: f64,
    relevance: f64,
}

impl Candidate<'_> {
    fn into_chunk(self) -> CodeChunk {
        with_importance(self.chunk, self.importance)
    }
}

/// Request-scoped additive importance boosts, keyed by chunk id.
pub(crate) type Boosts = HashMap<String, f64>;

/// Select a budgeted subset of the repo map.
pub fn select(map: &RepoMap, options: &SelectionOptions) -> SelectionResult {
    run_selection(map, options, &Boosts::new(), &[])
}

/// Shared selection path: boost, filter, order, then pack pinned ids,
/// priority files, and ordered candidates.
pub(crate) fn run_selection(
    map: &RepoMap,
    options: &SelectionOptions,
    boosts: &Boosts,
    pinned: &[String],
) -> SelectionResult {
    let words = options.task.as_deref().map(task_words).unwrap_or_default();

    let candidates: Vec<Candidate<'_>> = map
        .chunks
        .values()
        .map(|chunk| Candidate {
            chunk,
            importance: effective_importance(chunk, boosts),
            relevance: if words.is_empty() {
                0.0
            } else {
                relevance(chunk, &words)
            },
        })
        .filter(|c| passes_filters(c, options))
        .collect();
    let files_considered = candidates.len();
    let ordered = order_candidates(candidates, options.strategy, !words.is_empty());

    let mut budget = TokenBudget::new(options.max_tokens);
    for id in pinned.iter().chain(&options.priority_files) {
        let id = normalize_id(id);
        if let Some(chunk) = map.get(id) {
            budget.add(with_importance(chunk, effective_importance(chunk, boosts)));
        }
    }
    budget.pack(ordered.into_iter().map(Candidate::into_chunk));

    let result = budget.finish(files_considered);
    info!(
        strategy = %options.strategy,
        considered = result.stats.files_considered,
        selected = result.stats.files_selected,
        tokens = result.total_tokens,
        budget = options.max_tokens,
        "Context selected"
    );
    result
}

fn passes_filters(candidate: &Candidate<'_>, options: &SelectionOptions) -> bool {
    if candidate.importance < options.min_importance {
        return false;
    }
    match candidate.chunk.chunk_type {
        ChunkType::Types => options.include_types,
        ChunkType::Test => options.include_tests,
        _ => true,
    }
}

fn order_candidates(
    mut candidates: Vec<Candidate<'_>>,
    strategy: SelectionStrategy,
    has_task: bool,
) -> Vec<Candidate<'_>> {
    match strategy {
        SelectionStrategy::RelevanceFirst if has_task => {
            candidates.sort_by(|a, b| {
                relevance_band(b.relevance)
                    .cmp(&relevance_band(a.relevance))
                    .then(b.importance.total_cmp(&a.importance))
            });
            candidates
        }
        SelectionStrategy::ImportanceFirst | SelectionStrategy::RelevanceFirst => {
            sort_by_importance(&mut candidates);
            candidates
        }
        SelectionStrategy::BreadthFirst => round_robin_by_directory(candidates),
        SelectionStrategy::DepthFirst => {
            candidates.sort_by(|a, b| {
                let a_entry = a.chunk.chunk_type == ChunkType::EntryPoint;
                let b_entry = b.chunk.chunk_type == ChunkType::EntryPoint;
                b_entry
                    .cmp(&a_entry)
                    .then(b.importance.total_cmp(&a.importance))
            });
            candidates
        }
    }
}

fn sort_by_importance(candidates: &mut [Candidate<'_>]) {
    candidates.sort_by(|a, b| b.importance.total_cmp(&a.importance));
}

/// 0.1-wide relevance band, so near-ties fall through to importance.
fn relevance_band(relevance: f64) -> i64 {
    ((relevance + 1e-9) * 10.0).floor() as i64
}

/// One candidate per directory per round, directories in path order.
fn round_robin_by_directory(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    let total = candidates.len();
    let mut groups: BTreeMap<&str, Vec<Candidate<'_>>> = BTreeMap::new();
    for candidate in candidates {
        groups
            .entry(candidate.chunk.directory())
            .or_default()
            .push(candidate);
    }

    let mut queues: Vec<std::vec::IntoIter<Candidate<'_>>> = groups
        .into_values()
        .map(|mut group| {
            sort_by_importance(&mut group);
            group.into_iter()
        })
        .collect();

    let mut ordered = Vec::with_capacity(total);
    while ordered.len() < total {
        for queue in &mut queues {
            if let Some(candidate) = queue.next() {
                ordered.push(candidate);
            }
        }
    }
    ordered
}

/// Lowercased whitespace-separated task words. No stop-word removal.
pub fn task_words(task: &str) -> Vec<String> {
    task.split_whitespace().map(str::to_lowercase).collect()
}

/// Task relevance of a chunk in `[0, 1]`.
///
/// Per word: +0.3 if it appears in the path, +0.2 if it is a substring of
/// (or contains) any symbol, +0.1 if it appears in the first 2000
/// characters of content.
pub fn relevance(chunk: &CodeChunk, words: &[String]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let path = chunk.file_path.to_lowercase();
    let symbols: Vec<String> = chunk.symbols.iter().map(|s| s.to_lowercase()).collect();
    let prefix = content_prefix(&chunk.content, RELEVANCE_CONTENT_PREFIX).to_lowercase();

    let mut score = 0.0;
    for word in words {
        if path.contains(word.as_str()) {
            score += PATH_MATCH_WEIGHT;
        }
        if symbols
            .iter()
            .any(|s| s.contains(word.as_str()) || word.contains(s.as_str()))
        {
            score += SYMBOL_MATCH_WEIGHT;
        }
        if prefix.contains(word.as_str()) {
            score += CONTENT_MATCH_WEIGHT;
        }
    }
    score.min(1.0)
}

fn content_prefix(content: &str, chars: usize) -> &str {
    match content.char_indices().nth(chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn effective_importance(chunk: &CodeChunk, boosts: &Boosts) -> f64 {
    let boost = boosts.get(&chunk.id).copied().unwrap_or(0.0);
    (chunk.importance + boost).clamp(0.0, 1.0)
}

fn with_importance(chunk: &CodeChunk, importance: f64) -> CodeChunk {
    CodeChunk {
        importance,
        ..chunk.clone()
    }
}

/// Accept `./`-prefixed ids as given by users.
pub(crate) fn normalize_id(id: &str) -> &str {
    id.trim_start_matches("./")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::time::SystemTime;

    pub(crate) fn chunk(id: &str, tokens: u32, importance: f64, chunk_type: ChunkType) -> CodeChunk {
        CodeChunk {
            id: id.to_string(),
            file_path: id.to_string(),
            content: String::new(),
            token_count: tokens,
            importance,
            chunk_type,
            symbols: Vec::new(),
            dependencies: Vec::new(),
            last_modified: None,
        }
    }

    pub(crate) fn repo(chunks: Vec<CodeChunk>, edges: &[(&str, &str)]) -> RepoMap {
        let mut dependency_graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut reverse_dependency_graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in edges {
            dependency_graph
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string());
            reverse_dependency_graph
                .entry(to.to_string())
                .or_default()
                .insert(from.to_string());
        }
        let total_tokens = chunks.iter().map(|c| u64::from(c.token_count)).sum();
        RepoMap {
            root: PathBuf::from("/repo"),
            entry_points: chunks
                .iter()
                .filter(|c| c.chunk_type == ChunkType::EntryPoint)
                .map(|c| c.id.clone())
                .collect(),
            chunks: chunks.into_iter().map(|c| (c.id.clone(), c)).collect(),
            core_modules: Vec::new(),
            dependency_graph,
            reverse_dependency_graph,
            total_tokens,
            analyzed_at: SystemTime::UNIX_EPOCH,
        }
    }

    fn ids(result: &SelectionResult) -> Vec<&str> {
        result.chunks.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_forced_exclusion() {
        let map = repo(
            vec![
                chunk("a.ts", 900, 0.9, ChunkType::Other),
                chunk("b.ts", 200, 0.5, ChunkType::Other),
            ],
            &[],
        );

        let both = select(&map, &SelectionOptions::default().with_max_tokens(1100));
        assert_eq!(ids(&both), vec!["a.ts", "b.ts"]);
        assert_eq!(both.total_tokens, 1100);
        assert_eq!(both.remaining_tokens, 0);
        assert!(both.excluded.is_empty());

        let one = select(&map, &SelectionOptions::default().with_max_tokens(1099));
        assert_eq!(ids(&one), vec!["a.ts"]);
        assert_eq!(one.excluded, vec!["b.ts".to_string()]);
        assert_eq!(one.total_tokens, 900);
        assert_eq!(one.remaining_tokens, 199);
    }

    #[test]
    fn test_zero_budget_selects_nothing() {
        let map = repo(vec![chunk("a.ts", 1, 0.9, ChunkType::Other)], &[]);
        let result = select(&map, &SelectionOptions::default().with_max_tokens(0));
        assert!(result.chunks.is_empty());
        assert_eq!(result.stats.average_importance, 0.0);
        assert_eq!(result.stats.files_considered, 1);
    }

    #[test]
    fn test_filters() {
        let map = repo(
            vec![
                chunk("low.ts", 10, 0.1, ChunkType::Other),
                chunk("types/x.ts", 10, 0.7, ChunkType::Types),
                chunk("x.test.ts", 10, 0.2, ChunkType::Test),
                chunk("main.ts", 10, 0.9, ChunkType::EntryPoint),
            ],
            &[],
        );

        let defaults = select(&map, &SelectionOptions::default());
        assert_eq!(ids(&defaults), vec!["main.ts", "types/x.ts", "low.ts"]);

        let options = SelectionOptions {
            min_importance: 0.15,
            include_types: false,
            include_tests: true,
            ..SelectionOptions::default()
        };
        let filtered = select(&map, &options);
        assert_eq!(ids(&filtered), vec!["main.ts", "x.test.ts"]);
        assert_eq!(filtered.stats.files_considered, 2);
        assert_eq!(filtered.stats.coverage_percent, 100.0);
    }

    #[test]
    fn test_priority_files_first() {
        let map = repo(
            vec![
                chunk("a.ts", 10, 0.9, ChunkType::Other),
                chunk("b.ts", 10, 0.5, ChunkType::Other),
                chunk("c.ts", 10, 0.1, ChunkType::Other),
                chunk("huge.ts", 1000, 0.1, ChunkType::Other),
            ],
            &[],
        );
        let options = SelectionOptions::default()
            .with_max_tokens(30)
            .with_priority_files(vec![
                "./c.ts".to_string(),
                "huge.ts".to_string(),
                "missing.ts".to_string(),
            ]);
        let result = select(&map, &options);
        assert_eq!(ids(&result), vec!["c.ts", "a.ts", "b.ts"]);
        assert_eq!(result.excluded, vec!["huge.ts".to_string()]);
    }

    #[test]
    fn test_relevance_scoring() {
        let mut auth = chunk("src/auth/login.ts", 10, 0.5, ChunkType::Other);
        auth.symbols = vec!["LoginForm".to_string()];
        auth.content = "export function submitLogin() {}".to_string();

        let words = task_words("Fix LOGIN bug");
        // "login": path 0.3 + symbol 0.2 + content 0.1
        assert!((relevance(&auth, &words) - 0.6).abs() < 1e-9);
        assert_eq!(relevance(&auth, &[]), 0.0);

        let words = task_words("auth login form submitlogin loginform src");
        assert_eq!(relevance(&auth, &words), 1.0);
    }

    #[test]
    fn test_relevance_only_scans_content_prefix() {
        let mut c = chunk("x.ts", 10, 0.5, ChunkType::Other);
        c.content = format!("{}needle", "a".repeat(2000));
        assert_eq!(relevance(&c, &task_words("needle")), 0.0);
        c.content = format!("{}needle", "a".repeat(1990));
        assert!(relevance(&c, &task_words("needle")) > 0.0);
    }

    #[test]
    fn test_relevance_first_bands_break_ties_by_importance() {
        let map = repo(
            vec![
                chunk("billing/invoice.ts", 10, 0.3, ChunkType::Other),
                chunk("billing/tax.ts", 10, 0.9, ChunkType::Other),
                chunk("core/app.ts", 10, 1.0, ChunkType::Other),
            ],
            &[],
        );
        let options = SelectionOptions::default()
            .with_strategy(SelectionStrategy::RelevanceFirst)
            .with_task("billing");
        let result = select(&map, &options);
        assert_eq!(
            ids(&result),
            vec!["billing/tax.ts", "billing/invoice.ts", "core/app.ts"]
        );
    }

    #[test]
    fn test_relevance_first_without_task_uses_importance() {
        let map = repo(
            vec![
                chunk("a.ts", 10, 0.2, ChunkType::Other),
                chunk("b.ts", 10, 0.8, ChunkType::Other),
            ],
            &[],
        );
        let options = SelectionOptions::default().with_strategy(SelectionStrategy::RelevanceFirst);
        assert_eq!(ids(&select(&map, &options)), vec!["b.ts", "a.ts"]);
    }

    #[test]
    fn test_breadth_first_round_robin() {
        let map = repo(
            vec![
                chunk("a/1.ts", 10, 0.9, ChunkType::Other),
                chunk("a/2.ts", 10, 0.8, ChunkType::Other),
                chunk("a/3.ts", 10, 0.7, ChunkType::Other),
                chunk("b/1.ts", 10, 0.1, ChunkType::Other),
                chunk("c/1.ts", 10, 0.2, ChunkType::Other),
                chunk("c/2.ts", 10, 0.3, ChunkType::Other),
            ],
            &[],
        );
        let options = SelectionOptions::default().with_strategy(SelectionStrategy::BreadthFirst);
        assert_eq!(
            ids(&select(&map, &options)),
            vec!["a/1.ts", "b/1.ts", "c/2.ts", "a/2.ts", "c/1.ts", "a/3.ts"]
        );
    }

    #[test]
    fn test_depth_first_entry_points_lead() {
        let map = repo(
            vec![
                chunk("core.ts", 10, 0.95, ChunkType::CoreModule),
                chunk("main.ts", 10, 0.6, ChunkType::EntryPoint),
                chunk("cli.ts", 10, 0.7, ChunkType::EntryPoint),
                chunk("util.ts", 10, 0.5, ChunkType::Utility),
            ],
            &[],
        );
        let options = SelectionOptions::default().with_strategy(SelectionStrategy::DepthFirst);
        assert_eq!(
            ids(&select(&map, &options)),
            vec!["cli.ts", "main.ts", "core.ts", "util.ts"]
        );
    }

    #[test]
    fn test_budget_invariant_across_strategies() {
        let chunks: Vec<CodeChunk> = (0..40)
            .map(|i| {
                chunk(
                    &format!("d{}/f{i}.ts", i % 5),
                    (i * 37 % 113) + 1,
                    (i % 10) as f64 / 10.0,
                    ChunkType::Other,
                )
            })
            .collect();
        let map = repo(chunks, &[]);

        for strategy in [
            SelectionStrategy::ImportanceFirst,
            SelectionStrategy::RelevanceFirst,
            SelectionStrategy::BreadthFirst,
            SelectionStrategy::DepthFirst,
        ] {
            for max_tokens in [0, 1, 50, 333, 1000, 5000] {
                let options = SelectionOptions::default()
                    .with_strategy(strategy)
                    .with_max_tokens(max_tokens)
                    .with_task("f1 d2");
                let result = select(&map, &options);
                let sum: u32 = result.chunks.iter().map(|c| c.token_count).sum();
                assert!(sum <= max_tokens);
                assert_eq!(sum, result.total_tokens);
                assert_eq!(result.remaining_tokens, max_tokens - sum);

                let unique: BTreeSet<&str> = result.chunks.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(unique.len(), result.chunks.len());

                // deterministic
                assert_eq!(select(&map, &options), result);
            }
        }
    }

    #[test]
    fn test_strategy_names() {
        for s in ["importance_first", "relevance_first", "breadth_first", "depth_first"] {
            let parsed: SelectionStrategy = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("random".parse::<SelectionStrategy>().is_err());
    }

    #[test]
    fn test_options_from_config() {
        let config = SelectionConfig {
            strategy: "depth_first".to_string(),
            max_tokens: 1234,
            ..SelectionConfig::default()
        };
        let options = SelectionOptions::from_config(&config);
        assert_eq!(options.strategy, SelectionStrategy::DepthFirst);
        assert_eq!(options.max_tokens, 1234);
        assert!(!options.include_tests);
    }
}
