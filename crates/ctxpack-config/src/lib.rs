#![deny(unsafe_code)]

//! Configuration loading and validation for ctxpack.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure.
//! Every section and every key is optional; missing values fall back to the
//! defaults documented on each field.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy names accepted by `selection.strategy`.
pub const STRATEGIES: [&str; 4] = [
    "importance_first",
    "relevance_first",
    "breadth_first",
    "depth_first",
];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Repository discovery and chunk construction.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Repo map caching.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Defaults for budgeted selection.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Defaults for search.
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Repository analyzer configuration.
///
/// ## TOML Example
///
/// ```toml
/// [analyzer]
/// root = "."
/// include = ["**/*.ts", "**/*.py"]
/// exclude = ["**/node_modules/**"]
/// max_file_size = 102400
/// chars_per_token = 4.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Repository root to analyze.
    #[serde(default = "default_root")]
    pub root: String,

    /// Globs a file must match (any) to be analyzed.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Globs that exclude a file or an entire directory subtree.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Files larger than this many bytes are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Characters per token used by the token estimator.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,

    /// Globs identifying entry-point files.
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<String>,

    /// Globs identifying core-module files.
    #[serde(default = "default_core_modules")]
    pub core_modules: Vec<String>,

    /// Whether to build the import dependency graph.
    #[serde(default = "default_true")]
    pub analyze_dependencies: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include: default_include(),
            exclude: default_exclude(),
            max_file_size: default_max_file_size(),
            chars_per_token: default_chars_per_token(),
            entry_points: default_entry_points(),
            core_modules: default_core_modules(),
            analyze_dependencies: true,
        }
    }
}

fn default_root() -> String {
    ".".to_string()
}

fn default_include() -> Vec<String> {
    [
        "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.py",
        "**/*.rs", "**/*.go", "**/*.java", "**/*.md", "**/*.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/.git/**",
        "**/dist/**",
        "**/build/**",
        "**/target/**",
        "**/coverage/**",
        "**/*.min.js",
        "**/package-lock.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_size() -> u64 {
    100 * 1024 // 100 KiB
}

fn default_chars_per_token() -> f64 {
    4.0
}

fn default_entry_points() -> Vec<String> {
    [
        "**/index.ts",
        "**/index.js",
        "**/main.ts",
        "**/main.js",
        "**/app.ts",
        "**/app.js",
        "**/server.ts",
        "**/cli.ts",
        "**/main.py",
        "**/__main__.py",
        "**/main.rs",
        "**/lib.rs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_core_modules() -> Vec<String> {
    ["**/core/**", "**/services/**", "**/modules/**"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

/// Repo map cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether analysis results are cached per root.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live of a cached repo map, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

/// Defaults applied to selection requests that don't override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ordering strategy, one of [`STRATEGIES`].
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Chunks below this importance are never candidates.
    #[serde(default)]
    pub min_importance: f64,

    /// Whether `types` chunks are candidates.
    #[serde(default = "default_true")]
    pub include_types: bool,

    /// Whether `test` chunks are candidates.
    #[serde(default)]
    pub include_tests: bool,

    /// Flat importance boost for files related through reference lookups.
    #[serde(default = "default_lsp_boost_factor")]
    pub lsp_boost_factor: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            strategy: default_strategy(),
            min_importance: 0.0,
            include_types: true,
            include_tests: false,
            lsp_boost_factor: default_lsp_boost_factor(),
        }
    }
}

fn default_max_tokens() -> u32 {
    8000
}

fn default_strategy() -> String {
    "importance_first".to_string()
}

fn default_lsp_boost_factor() -> f64 {
    0.3
}

/// Defaults applied to search requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Enable approximate matching on symbols and filenames.
    #[serde(default)]
    pub fuzzy: bool,

    /// Maximum edit distance accepted by fuzzy matching.
    #[serde(default = "default_max_distance")]
    pub max_distance: usize,

    /// Also match full file content (all terms must be present).
    #[serde(default)]
    pub search_content: bool,

    /// Maximum number of ranked results.
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fuzzy: false,
            max_distance: default_max_distance(),
            search_content: false,
            limit: default_search_limit(),
        }
    }
}

fn default_max_distance() -> usize {
    2
}

fn default_search_limit() -> usize {
    20
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analyzer = &self.analyzer;
        if analyzer.root.is_empty() {
            return Err(ConfigError::Validation(
                "analyzer.root must not be empty".to_string(),
            ));
        }
        if analyzer.include.is_empty() {
            return Err(ConfigError::Validation(
                "analyzer.include must list at least one pattern".to_string(),
            ));
        }
        if analyzer.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "analyzer.max_file_size must be non-zero".to_string(),
            ));
        }
        if !(analyzer.chars_per_token.is_finite() && analyzer.chars_per_token > 0.0) {
            return Err(ConfigError::Validation(format!(
                "analyzer.chars_per_token must be positive, got {}",
                analyzer.chars_per_token
            )));
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be non-zero when the cache is enabled".to_string(),
            ));
        }

        let selection = &self.selection;
        if !STRATEGIES.contains(&selection.strategy.as_str()) {
            return Err(ConfigError::Validation(format!(
                "selection.strategy must be one of {:?}, got {:?}",
                STRATEGIES, selection.strategy
            )));
        }
        if !(0.0..=1.0).contains(&selection.min_importance) {
            return Err(ConfigError::Validation(format!(
                "selection.min_importance must be in [0.0, 1.0], got {}",
                selection.min_importance
            )));
        }
        if !(0.0..=1.0).contains(&selection.lsp_boost_factor) {
            return Err(ConfigError::Validation(format!(
                "selection.lsp_boost_factor must be in [0.0, 1.0], got {}",
                selection.lsp_boost_factor
            )));
        }

        if self.search.limit == 0 {
            return Err(ConfigError::Validation(
                "search.limit must be at least 1".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
