//! Repository analyzer: walks a source tree and builds a [`RepoMap`].
//!
//! Analysis runs in three phases:
//!
//! 1. **Discovery**: recursive descent from the root. Exclude globs are
//!    checked before descending, so excluded subtrees are never read.
//! 2. **Per-file processing**: stat, size check, read, token estimate,
//!    classification, symbol and import extraction, base importance. Any
//!    per-file failure skips that file.
//! 3. **Graph pass**: forward and reverse import graphs, then a single
//!    connectivity boost that needs the complete reverse graph.
//!
//! Each pass builds its own local structures and only publishes to the cache
//! once the snapshot is complete. Concurrent calls for the same root are not
//! coalesced; both run and the later one overwrites the cache entry.

pub mod cache;
pub mod classify;
pub mod extract;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use ctxpack_config::{AnalyzerConfig, CacheConfig, ConfigError};

use crate::glob::{GlobError, GlobMatcher};
use crate::model::{ChunkType, CodeChunk, RepoMap};
use crate::tokens::TokenEstimator;

use self::cache::{Clock, RepoMapCache, SystemClock};
use self::classify::{Classifier, base_importance};
use self::extract::ExtractorRegistry;

/// Weight of the connectivity boost relative to the most-imported file.
const CONNECTIVITY_WEIGHT: f64 = 0.2;

/// Errors from repository analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("repository root {} is not accessible: {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("repository root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read directory {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] GlobError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// A discovered file, before processing.
struct FileEntry {
    absolute: PathBuf,
    relative: String,
}

/// Builds and caches [`RepoMap`] snapshots.
#[derive(Debug)]
pub struct RepoAnalyzer {
    include: GlobMatcher,
    exclude: GlobMatcher,
    classifier: Classifier,
    extractors: ExtractorRegistry,
    estimator: TokenEstimator,
    max_file_size: u64,
    analyze_dependencies: bool,
    cache: Option<RepoMapCache>,
}

impl RepoAnalyzer {
    /// Create an analyzer from configuration, using the system clock.
    pub fn new(config: &AnalyzerConfig, cache: &CacheConfig) -> Result<Self, AnalyzeError> {
        Self::with_clock(config, cache, Arc::new(SystemClock))
    }

    /// Create an analyzer whose cache reads time from `clock`.
    pub fn with_clock(
        config: &AnalyzerConfig,
        cache: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AnalyzeError> {
        let cache = cache
            .enabled
            .then(|| RepoMapCache::with_clock(Duration::from_secs(cache.ttl_secs), clock));

        Ok(Self {
            include: GlobMatcher::new(&config.include)?,
            exclude: GlobMatcher::new(&config.exclude)?,
            classifier: Classifier::new(&config.entry_points, &config.core_modules)?,
            extractors: ExtractorRegistry::default(),
            estimator: TokenEstimator::new(config.chars_per_token),
            max_file_size: config.max_file_size,
            analyze_dependencies: config.analyze_dependencies,
            cache,
        })
    }

    /// Replace the extractor registry.
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// The token estimator used for chunk token counts.
    pub fn estimator(&self) -> TokenEstimator {
        self.estimator
    }

    /// The repo map cache, when caching is enabled.
    pub fn cache(&self) -> Option<&RepoMapCache> {
        self.cache.as_ref()
    }

    /// Drop every cached repo map.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Drop the cached repo map for one root.
    pub async fn invalidate(&self, root: &Path) -> bool {
        match tokio::fs::canonicalize(root).await {
            Ok(root) => self.cache.as_ref().is_some_and(|c| c.invalidate(&root)),
            Err(_) => false,
        }
    }

    /// Analyze the repository at `root`, serving a cached snapshot when fresh.
    pub async fn analyze(&self, root: &Path) -> Result<Arc<RepoMap>, AnalyzeError> {
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|source| AnalyzeError::Root {
                path: root.to_path_buf(),
                source,
            })?;

        if let Some(cache) = &self.cache {
            if let Some(map) = cache.get(&root) {
                debug!(root = %root.display(), "Repo map cache hit");
                return Ok(map);
            }
            debug!(root = %root.display(), "Repo map cache miss");
        }

        let map = Arc::new(self.build(&root).await?);

        if let Some(cache) = &self.cache {
            cache.insert(&root, Arc::clone(&map));
        }
        Ok(map)
    }

    /// Run a full analysis pass without consulting the cache.
    async fn build(&self, root: &Path) -> Result<RepoMap, AnalyzeError> {
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|source| AnalyzeError::Root {
                path: root.to_path_buf(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(AnalyzeError::NotADirectory(root.to_path_buf()));
        }

        let files = self.discover(root).await?;
        let discovered = files.len();

        let mut chunks = BTreeMap::new();
        let mut dependency_graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for file in files {
            let Some((chunk, targets)) = self.process_file(&file).await else {
                continue;
            };
            if !targets.is_empty() {
                dependency_graph.insert(chunk.id.clone(), targets);
            }
            chunks.insert(chunk.id.clone(), chunk);
        }

        let reverse_dependency_graph = reverse_graph(&dependency_graph);
        apply_connectivity_boost(&mut chunks, &reverse_dependency_graph);

        let entry_points = chunks
            .values()
            .filter(|c| c.chunk_type == ChunkType::EntryPoint)
            .map(|c| c.id.clone())
            .collect();
        let core_modules = chunks
            .values()
            .filter(|c| c.chunk_type == ChunkType::CoreModule)
            .map(|c| c.directory().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let total_tokens = chunks.values().map(|c| u64::from(c.token_count)).sum();

        let map = RepoMap {
            root: root.to_path_buf(),
            chunks,
            entry_points,
            core_modules,
            dependency_graph,
            reverse_dependency_graph,
            total_tokens,
            analyzed_at: SystemTime::now(),
        };

        info!(
            root = %root.display(),
            discovered,
            files = map.len(),
            tokens = map.total_tokens,
            "Repository analyzed"
        );
        Ok(map)
    }

    /// Walk the tree, returning included files. Excluded directories are pruned.
    async fn discover(&self, root: &Path) -> Result<Vec<FileEntry>, AnalyzeError> {
        let mut files = Vec::new();
        let mut pending = vec![(root.to_path_buf(), String::new())];

        while let Some((dir, dir_relative)) = pending.pop() {
            let mut read_dir =
                tokio::fs::read_dir(&dir)
                    .await
                    .map_err(|source| AnalyzeError::Walk {
                        path: dir.clone(),
                        source,
                    })?;

            let mut entries = Vec::new();
            while let Some(entry) =
                read_dir
                    .next_entry()
                    .await
                    .map_err(|source| AnalyzeError::Walk {
                        path: dir.clone(),
                        source,
                    })?
            {
                entries.push(entry);
            }
            entries.sort_by_key(|e| e.file_name());

            let mut subdirs = Vec::new();
            for entry in entries {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    debug!(path = %entry.path().display(), "Skipping non-UTF-8 path");
                    continue;
                };
                let relative = if dir_relative.is_empty() {
                    name
                } else {
                    format!("{dir_relative}/{name}")
                };

                if self.exclude.is_match(&relative) {
                    debug!(path = %relative, "Excluded");
                    continue;
                }

                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    subdirs.push((entry.path(), relative));
                } else if file_type.is_file() && self.include.is_match(&relative) {
                    files.push(FileEntry {
                        absolute: entry.path(),
                        relative,
                    });
                }
            }
            // Reverse so the stack pops subdirectories in name order.
            pending.extend(subdirs.into_iter().rev());
        }

        Ok(files)
    }

    /// Build a chunk and its candidate import targets, or `None` to skip the file.
    async fn process_file(&self, file: &FileEntry) -> Option<(CodeChunk, BTreeSet<String>)> {
        let metadata = match tokio::fs::metadata(&file.absolute).await {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %file.relative, error = %e, "Skipping file: stat failed");
                return None;
            }
        };
        if metadata.len() > self.max_file_size {
            debug!(
                path = %file.relative,
                size = metadata.len(),
                limit = self.max_file_size,
                "Skipping file: too large"
            );
            return None;
        }
        let content = match tokio::fs::read_to_string(&file.absolute).await {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %file.relative, error = %e, "Skipping file: unreadable");
                return None;
            }
        };

        let id = file.relative.clone();
        let chunk_type = self.classifier.classify(&id, &content);
        let extractor = self.extractors.for_path(&id);

        let symbols = extractor.map(|e| e.symbols(&content)).unwrap_or_default();
        let (dependencies, targets) = match extractor {
            Some(e) if self.analyze_dependencies => {
                let imports = e.imports(&content);
                let targets = imports
                    .iter()
                    .flat_map(|spec| e.resolve(&id, spec))
                    .filter(|target| *target != id)
                    .collect();
                (imports, targets)
            }
            _ => (Vec::new(), BTreeSet::new()),
        };

        let chunk = CodeChunk {
            token_count: self.estimator.estimate(&content),
            importance: base_importance(&id, chunk_type),
            file_path: id.clone(),
            id,
            content,
            chunk_type,
            symbols,
            dependencies,
            last_modified: metadata.modified().ok(),
        };
        Some((chunk, targets))
    }
}

/// Invert a forward graph. Dangling targets are kept as keys.
fn reverse_graph(
    forward: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut reverse: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (source, targets) in forward {
        for target in targets {
            reverse
                .entry(target.clone())
                .or_default()
                .insert(source.clone());
        }
    }
    reverse
}

/// Boost each chunk by its share of the maximum reverse-dependent count.
fn apply_connectivity_boost(
    chunks: &mut BTreeMap<String, CodeChunk>,
    reverse: &BTreeMap<String, BTreeSet<String>>,
) {
    let dependents = |id: &str| reverse.get(id).map_or(0, BTreeSet::len);
    let max = chunks.keys().map(|id| dependents(id)).max().unwrap_or(0);
    if max == 0 {
        return;
    }

    for chunk in chunks.values_mut() {
        let boost = dependents(&chunk.id) as f64 / max as f64 * CONNECTIVITY_WEIGHT;
        chunk.importance = (chunk.importance + boost).min(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn analyzer() -> RepoAnalyzer {
        RepoAnalyzer::new(&AnalyzerConfig::default(), &CacheConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_builds_chunks_and_graph() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.ts", "import { run } from './core/service';\nrun();\n");
        write(&dir, "core/service.ts", "export function run() {}\n");
        write(&dir, "utils/helper.ts", "export const helper = 1;\n");

        let map = analyzer().analyze(dir.path()).await.unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.entry_points, vec!["index.ts".to_string()]);
        assert_eq!(map.core_modules, vec!["core".to_string()]);
        assert_eq!(map.dependencies_of("index.ts"), vec!["core/service.ts"]);
        assert_eq!(map.dependents_of("core/service.ts"), vec!["index.ts"]);
        // dangling candidates are tolerated
        assert!(map.dependency_graph["index.ts"].contains("core/service/index.ts"));

        let service = map.get("core/service.ts").unwrap();
        assert_eq!(service.symbols, vec!["run"]);
        assert_eq!(service.chunk_type, ChunkType::CoreModule);
        assert!(service.last_modified.is_some());

        let index = map.get("index.ts").unwrap();
        assert_eq!(index.dependencies, vec!["./core/service"]);

        let total: u64 = map.chunks.values().map(|c| u64::from(c.token_count)).sum();
        assert_eq!(map.total_tokens, total);
    }

    #[tokio::test]
    async fn test_connectivity_boost() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.ts", "import './lib/a';\nimport './lib/b';\n");
        write(&dir, "lib/a.ts", "export const a = 1;\n");
        write(&dir, "lib/b.ts", "export const b = 1;\n");
        write(&dir, "lib/c.ts", "import './a';\nexport const c = 1;\n");

        let map = analyzer().analyze(dir.path()).await.unwrap();
        let a = map.get("lib/a.ts").unwrap().importance;
        let b = map.get("lib/b.ts").unwrap().importance;
        let c = map.get("lib/c.ts").unwrap().importance;

        // a: 2 dependents (max), b: 1, c: 0; same base score
        let base = base_importance("lib/a.ts", ChunkType::Utility);
        assert!((a - (base + 0.2)).abs() < 1e-9);
        assert!((b - (base + 0.1)).abs() < 1e-9);
        assert!((c - base).abs() < 1e-9);

        for chunk in map.chunks.values() {
            assert!((0.0..=1.0).contains(&chunk.importance));
        }
    }

    #[tokio::test]
    async fn test_excluded_subtree_is_not_walked() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/app.ts", "export const x = 1;\n");
        write(&dir, "node_modules/pkg/index.js", "module.exports = {};\n");
        write(&dir, "src/node_modules/inner.js", "x\n");

        let map = analyzer().analyze(dir.path()).await.unwrap();
        let ids: Vec<&String> = map.chunks.keys().collect();
        assert_eq!(ids, vec!["src/app.ts"]);
    }

    #[tokio::test]
    async fn test_oversized_and_unmatched_files_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "small.ts", "export const a = 1;\n");
        write(&dir, "big.ts", &"x".repeat(200));
        write(&dir, "image.png", "not really");

        let config = AnalyzerConfig {
            max_file_size: 100,
            ..AnalyzerConfig::default()
        };
        let analyzer = RepoAnalyzer::new(&config, &CacheConfig::default()).unwrap();
        let map = analyzer.analyze(dir.path()).await.unwrap();

        assert!(map.get("small.ts").is_some());
        assert!(map.get("big.ts").is_none());
        assert!(map.get("image.png").is_none());
    }

    #[tokio::test]
    async fn test_non_utf8_content_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bin.ts"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        write(&dir, "ok.ts", "export const ok = true;\n");

        let map = analyzer().analyze(dir.path()).await.unwrap();
        assert!(map.get("bin.ts").is_none());
        assert!(map.get("ok.ts").is_some());
    }

    #[tokio::test]
    async fn test_dependency_analysis_disabled() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.ts", "import './core/service';\n");
        write(&dir, "core/service.ts", "export function run() {}\n");

        let config = AnalyzerConfig {
            analyze_dependencies: false,
            ..AnalyzerConfig::default()
        };
        let analyzer = RepoAnalyzer::new(&config, &CacheConfig::default()).unwrap();
        let map = analyzer.analyze(dir.path()).await.unwrap();

        assert!(map.dependency_graph.is_empty());
        assert!(map.reverse_dependency_graph.is_empty());
        assert!(map.get("index.ts").unwrap().dependencies.is_empty());
        // symbols are still extracted
        assert_eq!(map.get("core/service.ts").unwrap().symbols, vec!["run"]);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let result = analyzer().analyze(Path::new("/nonexistent/ctxpack/root")).await;
        assert!(matches!(result, Err(AnalyzeError::Root { .. })));
    }

    #[tokio::test]
    async fn test_file_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.ts", "x");
        let result = analyzer().analyze(&dir.path().join("a.ts")).await;
        assert!(matches!(result, Err(AnalyzeError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_cache_disabled_reanalyzes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.ts", "export const a = 1;\n");

        let cache = CacheConfig {
            enabled: false,
            ttl_secs: 0,
        };
        let analyzer = RepoAnalyzer::new(&AnalyzerConfig::default(), &cache).unwrap();
        let first = analyzer.analyze(dir.path()).await.unwrap();
        write(&dir, "b.ts", "export const b = 1;\n");
        let second = analyzer.analyze(dir.path()).await.unwrap();

        assert!(analyzer.cache().is_none());
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
    }
}
