//! Temporary repository fixtures.
//!
//! A [`TestRepo`] owns a temp directory that tests populate with source
//! files before analyzing it.

use std::path::{Path, PathBuf};

use ctxpack_config::AppConfig;
use tempfile::TempDir;

use crate::config::TestConfigBuilder;

/// A test-scoped source tree in a temporary directory.
///
/// The directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Create a repository containing the given `(path, content)` files.
    pub async fn with_files(files: &[(&str, &str)]) -> Self {
        let repo = Self::new();
        for (path, content) in files {
            repo.write(path, content).await;
        }
        repo
    }

    /// Root of the repository.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a root-relative file.
    pub fn file(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write a root-relative file, creating parent directories.
    pub async fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.file(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .expect("failed to create fixture directory");
        }
        tokio::fs::write(&path, content)
            .await
            .expect("failed to write fixture file");
    }

    /// Delete a root-relative file.
    pub async fn remove(&self, relative: &str) {
        tokio::fs::remove_file(self.file(relative))
            .await
            .expect("failed to remove fixture file");
    }

    /// A config builder already pointed at this repository.
    pub fn config_builder(&self) -> TestConfigBuilder {
        TestConfigBuilder::new().root(self.path())
    }

    /// Default config pointed at this repository.
    pub fn config(&self) -> AppConfig {
        self.config_builder().build()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}
