//! Token budget packing and context assembly.
//!
//! Chunks are offered in order and added greedily: anything that fits in the
//! remaining budget goes in, anything that doesn't is recorded as excluded.
//! This is a deterministic greedy approximation, not an optimal knapsack.

use std::collections::HashSet;

use crate::model::{CodeChunk, SelectionResult, SelectionStats};
use crate::tokens::TokenEstimator;

/// Greedy packer over a fixed token budget.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    /// Total token budget.
    budget: u32,
    /// Tokens used by packed chunks.
    used: u32,
    /// Chunks packed so far, in packing order.
    chunks: Vec<CodeChunk>,
    ids: HashSet<String>,
    /// Ids that were offered but did not fit, in first-offered order.
    excluded: Vec<String>,
    excluded_ids: HashSet<String>,
}

impl TokenBudget {
    /// Create an empty packer with the given budget.
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            used: 0,
            chunks: Vec::new(),
            ids: HashSet::new(),
            excluded: Vec::new(),
            excluded_ids: HashSet::new(),
        }
    }

    /// Tokens still available.
    pub fn available(&self) -> u32 {
        self.budget.saturating_sub(self.used)
    }

    /// Tokens used by packed chunks.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Total budget.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Number of packed chunks.
    pub fn item_count(&self) -> usize {
        self.chunks.len()
    }

    /// Whether a chunk with this id is already packed.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Packed chunks in packing order.
    pub fn chunks(&self) -> &[CodeChunk] {
        &self.chunks
    }

    /// Add a chunk if it fits within the budget.
    ///
    /// Returns `true` if the chunk was added. Already-packed chunks are
    /// ignored; chunks that don't fit are recorded as excluded.
    pub fn add(&mut self, chunk: CodeChunk) -> bool {
        if self.ids.contains(&chunk.id) {
            return false;
        }
        if chunk.token_count <= self.available() {
            self.used += chunk.token_count;
            self.ids.insert(chunk.id.clone());
            self.chunks.push(chunk);
            true
        } else {
            if self.excluded_ids.insert(chunk.id.clone()) {
                self.excluded.push(chunk.id);
            }
            false
        }
    }

    /// Offer chunks in order. Returns the number that were packed.
    pub fn pack(&mut self, chunks: impl IntoIterator<Item = CodeChunk>) -> usize {
        let mut packed = 0;
        for chunk in chunks {
            if self.add(chunk) {
                packed += 1;
            }
        }
        packed
    }

    /// Finish packing into a [`SelectionResult`].
    ///
    /// `files_considered` is the size of the filtered candidate set.
    pub fn finish(self, files_considered: usize) -> SelectionResult {
        let files_selected = self.chunks.len();
        let coverage_percent = if files_considered == 0 {
            0.0
        } else {
            files_selected as f64 / files_considered as f64 * 100.0
        };
        let average_importance = if files_selected == 0 {
            0.0
        } else {
            self.chunks.iter().map(|c| c.importance).sum::<f64>() / files_selected as f64
        };

        SelectionResult {
            remaining_tokens: self.available(),
            total_tokens: self.used,
            chunks: self.chunks,
            excluded: self.excluded,
            stats: SelectionStats {
                files_considered,
                files_selected,
                coverage_percent,
                average_importance,
            },
        }
    }
}

/// Concatenate chunk contents, each under a `// File:` header, up to a token ceiling.
///
/// Chunks are taken in order; assembly stops before the first chunk whose
/// section would exceed `max_tokens`.
pub fn assemble_context(chunks: &[CodeChunk], max_tokens: u32, estimator: &TokenEstimator) -> String {
    let mut output = String::new();
    let mut used = 0u32;
    for chunk in chunks {
        let section = format!("// File: {}\n{}\n\n", chunk.file_path, chunk.content);
        let tokens = estimator.estimate(&section);
        if used.saturating_add(tokens) > max_tokens {
            break;
        }
        used += tokens;
        output.push_str(&section);
    }
    output
}
