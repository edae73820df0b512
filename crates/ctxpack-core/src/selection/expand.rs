//! One-hop expansion of an existing selection along the import graph.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{CodeChunk, RepoMap};

use super::packing::TokenBudget;
use super::{normalize_id, relevance, task_words};

/// Which graph edges to follow from the selected set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandDirection {
    /// Files the selection imports.
    Dependencies,
    /// Files importing the selection.
    Dependents,
    #[default]
    Both,
}

impl std::fmt::Display for ExpandDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpandDirection::Dependencies => write!(f, "dependencies"),
            ExpandDirection::Dependents => write!(f, "dependents"),
            ExpandDirection::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for ExpandDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dependencies" => Ok(ExpandDirection::Dependencies),
            "dependents" => Ok(ExpandDirection::Dependents),
            "both" => Ok(ExpandDirection::Both),
            other => Err(format!("unknown expansion direction: {other:?}")),
        }
    }
}

/// Parameters of an expansion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionOptions {
    pub direction: ExpandDirection,
    /// Budget for added chunks only, separate from the original selection.
    pub max_tokens_to_add: u32,
    /// When set, only neighbors with positive relevance to it are added.
    pub query: Option<String>,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            direction: ExpandDirection::Both,
            max_tokens_to_add: 2000,
            query: None,
        }
    }
}

/// Chunks added by an expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionResult {
    pub added: Vec<CodeChunk>,
    pub tokens_added: u32,
    /// Neighbors that qualified but did not fit.
    pub excluded: Vec<String>,
}

/// Add one-hop neighbors of `selected` within `max_tokens_to_add`.
///
/// Neighbors already in `selected` are never revisited. Candidates are
/// offered by descending importance, ties in path order.
pub fn expand(map: &RepoMap, selected: &[String], options: &ExpansionOptions) -> ExpansionResult {
    let selected: HashSet<&str> = selected.iter().map(|id| normalize_id(id)).collect();

    let mut neighbors: BTreeSet<&str> = BTreeSet::new();
    for id in &selected {
        if matches!(
            options.direction,
            ExpandDirection::Dependencies | ExpandDirection::Both
        ) {
            neighbors.extend(map.dependencies_of(id));
        }
        if matches!(
            options.direction,
            ExpandDirection::Dependents | ExpandDirection::Both
        ) {
            neighbors.extend(map.dependents_of(id));
        }
    }

    let words = options.query.as_deref().map(task_words).unwrap_or_default();
    let mut candidates: Vec<&CodeChunk> = neighbors
        .into_iter()
        .filter(|id| !selected.contains(id))
        .filter_map(|id| map.get(id))
        .filter(|chunk| words.is_empty() || relevance(chunk, &words) > 0.0)
        .collect();
    candidates.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let mut budget = TokenBudget::new(options.max_tokens_to_add);
    budget.pack(candidates.into_iter().cloned());
    let result = budget.finish(0);

    debug!(
        direction = %options.direction,
        added = result.chunks.len(),
        tokens = result.total_tokens,
        "Selection expanded"
    );

    ExpansionResult {
        added: result.chunks,
        tokens_added: result.total_tokens,
        excluded: result.excluded,
    }
}
