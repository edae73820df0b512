//! File role classification and base importance scoring.

use std::sync::LazyLock;

use regex::Regex;

use crate::glob::{GlobError, GlobMatcher};
use crate::model::ChunkType;

/// Depth bonus for root-level files; shrinks per directory level.
const MAX_DEPTH_BONUS: f64 = 0.1;
const DEPTH_BONUS_STEP: f64 = 0.02;

/// Bonus for index / module-root files.
const INDEX_FILE_BONUS: f64 = 0.1;

/// File stems treated as module roots.
const INDEX_STEMS: [&str; 3] = ["index", "mod", "__init__"];

static INTERFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\binterface\s+[A-Za-z_$]").expect("INTERFACE_RE regex should compile")
});

static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\b").expect("FUNCTION_RE regex should compile"));

/// Ordered rule evaluation assigning each file a [`ChunkType`].
#[derive(Debug, Clone)]
pub struct Classifier {
    entry_points: GlobMatcher,
    core_modules: GlobMatcher,
}

impl Classifier {
    /// Compile the entry-point and core-module globs.
    pub fn new<S: AsRef<str>>(entry_points: &[S], core_modules: &[S]) -> Result<Self, GlobError> {
        Ok(Self {
            entry_points: GlobMatcher::new(entry_points)?,
            core_modules: GlobMatcher::new(core_modules)?,
        })
    }

    /// Classify a file. Rules are tried top to bottom; the first match wins.
    pub fn classify(&self, path: &str, content: &str) -> ChunkType {
        // Leading slash so directory markers also match at the root.
        let rooted = format!("/{path}");
        let lower = rooted.to_lowercase();

        if self.entry_points.is_match(path) {
            ChunkType::EntryPoint
        } else if [".test.", ".spec.", "__tests__", "/test/"]
            .iter()
            .any(|m| lower.contains(m))
        {
            ChunkType::Test
        } else if lower.contains("/types")
            || lower.ends_with(".d.ts")
            || (INTERFACE_RE.is_match(content) && !FUNCTION_RE.is_match(content))
        {
            ChunkType::Types
        } else if lower.contains("config") || lower.contains("settings") || lower.ends_with(".json")
        {
            ChunkType::Config
        } else if lower.ends_with(".md") || lower.ends_with(".txt") {
            ChunkType::Documentation
        } else if ["/utils/", "/helpers/", "/lib/"]
            .iter()
            .any(|m| lower.contains(m))
        {
            ChunkType::Utility
        } else if self.core_modules.is_match(path) {
            ChunkType::CoreModule
        } else {
            ChunkType::Other
        }
    }
}

/// Base importance: type score plus depth and index-file bonuses, clamped to 1.
pub fn base_importance(path: &str, chunk_type: ChunkType) -> f64 {
    let depth = path.matches('/').count() as f64;
    let depth_bonus = (MAX_DEPTH_BONUS - depth * DEPTH_BONUS_STEP).max(0.0);

    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let index_bonus = if INDEX_STEMS.contains(&stem) {
        INDEX_FILE_BONUS
    } else {
        0.0
    };

    (chunk_type.base_score() + depth_bonus + index_bonus).min(1.0)
}
