//! Reference-lookup enhancement of a selection.
//!
//! An optional collaborator (typically a language server) answers
//! reference, definition, and hover queries for the file being edited.
//! Files it reports, plus the editing file's static graph neighbors, get a
//! flat importance boost for this request only. The editing file is pinned
//! ahead of everything else.
//!
//! A missing or inactive collaborator never fails selection: the base
//! selection is returned with an empty enhancement record. Failed queries
//! count as no data, and the static graph edges still apply.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::model::{EnhancedContextResult, LookupEnhancement, RepoMap};

use super::{Boosts, SelectionOptions, normalize_id, run_selection};

/// Default additive boost for lookup-reported files.
pub const DEFAULT_BOOST_FACTOR: f64 = 0.3;

/// Zero-based cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A position inside a file, as reported by the collaborator.
///
/// `file` may be a `file://` URI, an absolute path, or a root-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub position: Position,
}

/// Errors from the reference-lookup collaborator.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup service unavailable: {0}")]
    Unavailable(String),

    #[error("lookup request failed: {0}")]
    Request(String),

    #[error("lookup timed out")]
    Timeout,
}

/// Reference/definition/hover queries by file and position.
///
/// Uses `BoxFuture` for object safety (allows `&dyn ReferenceLookup`).
pub trait ReferenceLookup: Send + Sync {
    /// Whether the collaborator is ready to answer queries.
    fn is_active(&self) -> bool;

    /// Locations referencing the symbol at `position` in `file`.
    fn find_references(
        &self,
        file: &str,
        position: Position,
    ) -> BoxFuture<'_, Result<Vec<Location>, LookupError>>;

    /// Definition sites of the symbol at `position` in `file`.
    fn find_definition(
        &self,
        file: &str,
        position: Position,
    ) -> BoxFuture<'_, Result<Vec<Location>, LookupError>>;

    /// Hover text for the symbol at `position`, if any.
    fn hover(&self, file: &str, position: Position)
    -> BoxFuture<'_, Result<Option<String>, LookupError>>;
}

/// Parameters of an enhanced selection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedSelectionOptions {
    /// Options shared with the base selection.
    pub base: SelectionOptions,
    /// Root-relative path of the file being edited.
    pub editing_file: Option<String>,
    /// Cursor position inside the editing file.
    pub position: Option<Position>,
    /// Flat importance boost for lookup-reported files.
    pub lsp_boost_factor: f64,
}

impl Default for EnhancedSelectionOptions {
    fn default() -> Self {
        Self {
            base: SelectionOptions::default(),
            editing_file: None,
            position: None,
            lsp_boost_factor: DEFAULT_BOOST_FACTOR,
        }
    }
}

impl EnhancedSelectionOptions {
    /// Wrap base options with the default boost factor.
    pub fn new(base: SelectionOptions) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Builder-style editing file.
    pub fn with_editing_file(mut self, file: impl Into<String>) -> Self {
        self.editing_file = Some(file.into());
        self
    }

    /// Builder-style cursor position.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Builder-style boost factor.
    pub fn with_boost_factor(mut self, factor: f64) -> Self {
        self.lsp_boost_factor = factor;
        self
    }
}

/// Files gathered from the collaborator for one editing file.
#[derive(Debug, Default)]
struct Gathered {
    referencing: BTreeSet<String>,
    dependencies: BTreeSet<String>,
    symbol: Option<String>,
}

/// Select with reference-lookup boosting, degrading to the base selection.
pub async fn select_with_lookup(
    map: &RepoMap,
    options: &EnhancedSelectionOptions,
    lookup: Option<&dyn ReferenceLookup>,
) -> EnhancedContextResult {
    let base_result = || EnhancedContextResult {
        selection: run_selection(map, &options.base, &Boosts::new(), &[]),
        enhancement: LookupEnhancement::default(),
    };

    let Some(editing) = options.editing_file.as_deref().map(normalize_id) else {
        return base_result();
    };
    let Some(lookup) = lookup.filter(|l| l.is_active()) else {
        debug!(file = %editing, "No active reference lookup; using base selection");
        return base_result();
    };

    let mut gathered = gather(map, editing, options.position, lookup).await;
    gathered
        .dependencies
        .extend(map.dependencies_of(editing).into_iter().map(str::to_string));
    gathered
        .referencing
        .extend(map.dependents_of(editing).into_iter().map(str::to_string));
    if gathered.referencing.is_empty() && gathered.dependencies.is_empty() {
        debug!(file = %editing, "No related files found; using base selection");
        return base_result();
    }

    let boosts: Boosts = gathered
        .referencing
        .iter()
        .chain(&gathered.dependencies)
        .map(|id| (id.clone(), options.lsp_boost_factor))
        .collect();

    let selection = run_selection(map, &options.base, &boosts, &[editing.to_string()]);
    let boosted_files: Vec<String> = selection
        .chunks
        .iter()
        .filter(|c| boosts.contains_key(&c.id))
        .map(|c| c.id.clone())
        .collect();

    info!(
        file = %editing,
        referencing = gathered.referencing.len(),
        dependencies = gathered.dependencies.len(),
        boosted = boosted_files.len(),
        "Selection enhanced with reference lookup"
    );

    EnhancedContextResult {
        selection,
        enhancement: LookupEnhancement {
            editing_file: Some(editing.to_string()),
            symbol_at_cursor: gathered.symbol,
            referencing_files: gathered.referencing.into_iter().collect(),
            dependency_files: gathered.dependencies.into_iter().collect(),
            boosted_files,
        },
    }
}

/// Query the collaborator. Errors are logged and treated as no data.
///
/// Only files present in the map are kept, and the editing file itself is
/// dropped.
async fn gather(
    map: &RepoMap,
    editing: &str,
    position: Option<Position>,
    lookup: &dyn ReferenceLookup,
) -> Gathered {
    let mut gathered = Gathered::default();
    let keep = |location: &Location| {
        let id = location_id(map, &location.file);
        (id != editing && map.chunks.contains_key(id.as_str())).then_some(id)
    };

    let mut positions = vec![Position::default()];
    if let Some(cursor) = position.filter(|p| *p != Position::default()) {
        positions.push(cursor);
    }
    for at in positions {
        match lookup.find_references(editing, at).await {
            Ok(locations) => gathered
                .referencing
                .extend(locations.iter().filter_map(keep)),
            Err(e) => warn!(file = %editing, error = %e, "Reference query failed"),
        }
    }

    if let Some(at) = position {
        match lookup.find_definition(editing, at).await {
            Ok(locations) => gathered
                .dependencies
                .extend(locations.iter().filter_map(keep)),
            Err(e) => warn!(file = %editing, error = %e, "Definition query failed"),
        }
        match lookup.hover(editing, at).await {
            Ok(text) => gathered.symbol = text.as_deref().and_then(hover_symbol),
            Err(e) => warn!(file = %editing, error = %e, "Hover query failed"),
        }
    }

    gathered
}

/// Map a reported file to a chunk id: strip a `file://` scheme and the root.
fn location_id(map: &RepoMap, file: &str) -> String {
    let path = file.strip_prefix("file://").unwrap_or(file);
    let root = map.root.to_string_lossy();
    let relative = path
        .strip_prefix(root.as_ref())
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path);
    normalize_id(relative).to_string()
}

/// First non-fence line of hover text.
fn hover_symbol(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("```"))
        .map(str::to_string)
}
