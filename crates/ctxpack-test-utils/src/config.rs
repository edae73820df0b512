//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use ctxpack_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .root(repo.path())
///     .cache_ttl_secs(60)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn root(mut self, root: &Path) -> Self {
        self.config.analyzer.root = root.display().to_string();
        self
    }

    pub fn include(mut self, globs: &[&str]) -> Self {
        self.config.analyzer.include = globs.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn exclude(mut self, globs: &[&str]) -> Self {
        self.config.analyzer.exclude = globs.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.analyzer.max_file_size = bytes;
        self
    }

    pub fn chars_per_token(mut self, ratio: f64) -> Self {
        self.config.analyzer.chars_per_token = ratio;
        self
    }

    pub fn analyze_dependencies(mut self, enabled: bool) -> Self {
        self.config.analyzer.analyze_dependencies = enabled;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache.ttl_secs = secs;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.selection.max_tokens = max_tokens;
        self
    }

    pub fn strategy(mut self, strategy: &str) -> Self {
        self.config.selection.strategy = strategy.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
