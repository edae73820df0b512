//! Engine facade: one configured root, one analyzer, every query.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ctxpack_config::AppConfig;

use crate::analyzer::cache::Clock;
use crate::analyzer::{AnalyzeError, RepoAnalyzer};
use crate::model::{CodeChunk, EnhancedContextResult, RepoMap, ScoredChunk, SelectionResult};
use crate::search::{self, SearchOptions};
use crate::selection::expand::{self, ExpansionOptions, ExpansionResult};
use crate::selection::lookup::{self, EnhancedSelectionOptions, ReferenceLookup};
use crate::selection::packing::assemble_context;
use crate::selection::{self, SelectionOptions};

/// Analyzer plus loaded configuration for a single repository root.
///
/// Every query analyzes the root first; a fresh cached snapshot makes that
/// free. Analysis is the only step that can fail.
#[derive(Debug)]
pub struct ContextEngine {
    config: AppConfig,
    root: PathBuf,
    analyzer: RepoAnalyzer,
}

impl ContextEngine {
    /// Create an engine for `config.analyzer.root`. The config is validated
    /// first.
    pub fn new(config: AppConfig) -> Result<Self, AnalyzeError> {
        config.validate()?;
        let analyzer = RepoAnalyzer::new(&config.analyzer, &config.cache)?;
        Ok(Self::assemble(config, analyzer))
    }

    /// Create an engine whose cache reads time from `clock`.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, AnalyzeError> {
        config.validate()?;
        let analyzer = RepoAnalyzer::with_clock(&config.analyzer, &config.cache, clock)?;
        Ok(Self::assemble(config, analyzer))
    }

    fn assemble(config: AppConfig, analyzer: RepoAnalyzer) -> Self {
        Self {
            root: PathBuf::from(&config.analyzer.root),
            config,
            analyzer,
        }
    }

    /// Point the engine at a different root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn analyzer(&self) -> &RepoAnalyzer {
        &self.analyzer
    }

    /// Analyze the root, or return the cached snapshot.
    pub async fn analyze(&self) -> Result<Arc<RepoMap>, AnalyzeError> {
        self.analyzer.analyze(&self.root).await
    }

    /// Selection defaults from `[selection]`.
    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions::from_config(&self.config.selection)
    }

    /// Enhanced selection defaults from `[selection]`.
    pub fn enhanced_options(&self) -> EnhancedSelectionOptions {
        EnhancedSelectionOptions::new(self.selection_options())
            .with_boost_factor(self.config.selection.lsp_boost_factor)
    }

    /// Search defaults from `[search]`.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::from_config(&self.config.search)
    }

    pub async fn select(&self, options: &SelectionOptions) -> Result<SelectionResult, AnalyzeError> {
        let map = self.analyze().await?;
        Ok(selection::select(&map, options))
    }

    pub async fn select_with_lookup(
        &self,
        options: &EnhancedSelectionOptions,
        lookup: Option<&dyn ReferenceLookup>,
    ) -> Result<EnhancedContextResult, AnalyzeError> {
        let map = self.analyze().await?;
        Ok(lookup::select_with_lookup(&map, options, lookup).await)
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<CodeChunk>, AnalyzeError> {
        let map = self.analyze().await?;
        Ok(search::search(&map, query, options)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn search_ranked(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ScoredChunk>, AnalyzeError> {
        let map = self.analyze().await?;
        Ok(search::search_ranked(&map, query, options))
    }

    pub async fn expand(
        &self,
        selected: &[String],
        options: &ExpansionOptions,
    ) -> Result<ExpansionResult, AnalyzeError> {
        let map = self.analyze().await?;
        Ok(expand::expand(&map, selected, options))
    }

    /// Concatenate selected chunks up to `max_tokens`.
    pub fn assemble_context(&self, chunks: &[CodeChunk], max_tokens: u32) -> String {
        assemble_context(chunks, max_tokens, &self.analyzer.estimator())
    }

    pub fn clear_cache(&self) {
        self.analyzer.clear_cache();
    }

    /// Drop the cached snapshot of this engine's root.
    pub async fn invalidate(&self) -> bool {
        self.analyzer.invalidate(&self.root).await
    }
}
