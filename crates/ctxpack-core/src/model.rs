//! Plain data types shared by the analyzer, search, and selection engines.
//!
//! These carry no behavior beyond small accessors and serialize cleanly for
//! downstream consumers (context assembly, dashboards, the CLI's JSON output).

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// The role a file plays in its repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    EntryPoint,
    CoreModule,
    Utility,
    Types,
    Config,
    Test,
    Documentation,
    Other,
}

impl ChunkType {
    /// All variants, in declaration order.
    pub const ALL: [ChunkType; 8] = [
        ChunkType::EntryPoint,
        ChunkType::CoreModule,
        ChunkType::Utility,
        ChunkType::Types,
        ChunkType::Config,
        ChunkType::Test,
        ChunkType::Documentation,
        ChunkType::Other,
    ];

    /// Base importance before position and connectivity adjustments.
    pub fn base_score(self) -> f64 {
        match self {
            ChunkType::EntryPoint => 0.9,
            ChunkType::CoreModule => 0.8,
            ChunkType::Types => 0.7,
            ChunkType::Config => 0.6,
            ChunkType::Utility => 0.5,
            ChunkType::Other => 0.4,
            ChunkType::Documentation => 0.3,
            ChunkType::Test => 0.2,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkType::EntryPoint => write!(f, "entry_point"),
            ChunkType::CoreModule => write!(f, "core_module"),
            ChunkType::Utility => write!(f, "utility"),
            ChunkType::Types => write!(f, "types"),
            ChunkType::Config => write!(f, "config"),
            ChunkType::Test => write!(f, "test"),
            ChunkType::Documentation => write!(f, "documentation"),
            ChunkType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkType::ALL
            .into_iter()
            .find(|t| t.to_string() == s)
            .ok_or_else(|| format!("unknown chunk type: {s:?}"))
    }
}

/// One analyzed file plus derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Repo-relative, `/`-separated path. Unique key.
    pub id: String,
    /// Same as `id`; kept separate for consumers that key on paths.
    pub file_path: String,
    /// Raw file text.
    pub content: String,
    /// Estimated token count of `content`.
    pub token_count: u32,
    /// Heuristic ranking signal, always within `[0, 1]`.
    pub importance: f64,
    /// File role.
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    /// Extracted identifier names, in source order.
    pub symbols: Vec<String>,
    /// Import specifiers as written in the source.
    pub dependencies: Vec<String>,
    /// Filesystem modification time, informational only.
    pub last_modified: Option<SystemTime>,
}

impl CodeChunk {
    /// Directory part of the path (`""` for root-level files).
    pub fn directory(&self) -> &str {
        self.file_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.file_path)
    }
}

/// Snapshot of an analyzed repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMap {
    /// Absolute root the snapshot was built from.
    pub root: PathBuf,
    /// Chunks keyed by id.
    pub chunks: BTreeMap<String, CodeChunk>,
    /// Ids of entry-point chunks.
    pub entry_points: Vec<String>,
    /// Directories containing core-module chunks.
    pub core_modules: Vec<String>,
    /// File id → ids it imports. Targets may be dangling candidate paths.
    pub dependency_graph: BTreeMap<String, BTreeSet<String>>,
    /// Inverse of `dependency_graph`.
    pub reverse_dependency_graph: BTreeMap<String, BTreeSet<String>>,
    /// Sum of chunk token counts.
    pub total_tokens: u64,
    /// When the snapshot was built.
    pub analyzed_at: SystemTime,
}

impl RepoMap {
    /// Look up a chunk by id.
    pub fn get(&self, id: &str) -> Option<&CodeChunk> {
        self.chunks.get(id)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the snapshot holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Existing chunk ids the given file imports.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.existing_neighbors(&self.dependency_graph, id)
    }

    /// Existing chunk ids that import the given file.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.existing_neighbors(&self.reverse_dependency_graph, id)
    }

    fn existing_neighbors<'a>(
        &'a self,
        graph: &'a BTreeMap<String, BTreeSet<String>>,
        id: &str,
    ) -> Vec<&'a str> {
        graph
            .get(id)
            .map(|targets| {
                targets
                    .iter()
                    .filter(|t| self.chunks.contains_key(t.as_str()))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Generate a summary string for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut by_type: BTreeMap<ChunkType, usize> = BTreeMap::new();
        for chunk in self.chunks.values() {
            *by_type.entry(chunk.chunk_type).or_default() += 1;
        }
        let edges: usize = self
            .chunks
            .keys()
            .map(|id| self.dependencies_of(id).len())
            .sum();

        let mut output = format!(
            "Repo map: {} files, {} tokens, {} resolved imports\n",
            self.len(),
            self.total_tokens,
            edges
        );
        for (chunk_type, count) in &by_type {
            output.push_str(&format!("  {chunk_type}: {count}\n"));
        }
        if !self.entry_points.is_empty() {
            output.push_str(&format!("  entry points: {}\n", self.entry_points.join(", ")));
        }
        output
    }
}

/// Summary statistics of a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionStats {
    /// Candidates after filtering, before priority injection.
    pub files_considered: usize,
    pub files_selected: usize,
    /// `files_selected / files_considered * 100`, 0 when nothing was considered.
    pub coverage_percent: f64,
    /// Mean importance of the selected chunks, 0 when nothing was selected.
    pub average_importance: f64,
}

/// Result of a budgeted selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Selected chunks in packing order, no duplicates.
    pub chunks: Vec<CodeChunk>,
    /// Never exceeds the requested budget.
    pub total_tokens: u32,
    pub remaining_tokens: u32,
    /// Ids that were offered but did not fit.
    pub excluded: Vec<String>,
    pub stats: SelectionStats,
}

/// What a reference-lookup pass contributed to a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupEnhancement {
    /// The file being edited, if enhancement ran.
    pub editing_file: Option<String>,
    /// Symbol under the cursor, as reported by hover.
    pub symbol_at_cursor: Option<String>,
    /// Files referencing the editing file.
    pub referencing_files: Vec<String>,
    /// Files the editing file depends on.
    pub dependency_files: Vec<String>,
    /// Boosted files that made it into the final selection.
    pub boosted_files: Vec<String>,
}

impl LookupEnhancement {
    /// Whether the enhancement contributed nothing.
    pub fn is_empty(&self) -> bool {
        self.editing_file.is_none()
            && self.referencing_files.is_empty()
            && self.dependency_files.is_empty()
    }
}

/// A selection enriched with reference-lookup signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancedContextResult {
    pub selection: SelectionResult,
    pub enhancement: LookupEnhancement,
}

/// A search hit with its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: CodeChunk,
    pub score: f64,
}
