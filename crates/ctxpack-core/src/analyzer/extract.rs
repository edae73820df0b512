//! Symbol and import extraction from source files.
//!
//! Extraction is regex-based and best-effort: it may miss or over-count
//! declarations, which only affects ranking. Each language class implements
//! [`SymbolExtractor`], and the [`ExtractorRegistry`] picks one by file
//! extension so a parser-backed extractor can replace a regex one without
//! touching graph construction or selection.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

/// Extensions tried when resolving an extensionless script import.
const SCRIPT_EXTENSIONS: [&str; 6] = ["ts", "tsx", "js", "jsx", "mjs", "cjs"];

static SCRIPT_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:class|function\*?|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    )
    .expect("SCRIPT_DECL_RE regex should compile")
});

static SCRIPT_EXPORT_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s*(?:type\s+)?\{([^}]*)\}").expect("SCRIPT_EXPORT_LIST_RE regex should compile")
});

static SCRIPT_FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bfrom\s+['"]([^'"]+)['"]"#).expect("SCRIPT_FROM_RE regex should compile")
});

static SCRIPT_BARE_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#)
        .expect("SCRIPT_BARE_IMPORT_RE regex should compile")
});

static SCRIPT_CALL_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("SCRIPT_CALL_IMPORT_RE regex should compile")
});

static PYTHON_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:async\s+)?(?:class|def)\s+([A-Za-z_]\w*)")
        .expect("PYTHON_DECL_RE regex should compile")
});

static PYTHON_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+(\.*[\w.]*)\s+import\b|import\s+([\w.]+))")
        .expect("PYTHON_IMPORT_RE regex should compile")
});

static RUST_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^pub(?:\([^)]*\))?\s+(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|type|const|static|mod)\s+([A-Za-z_]\w*)",
    )
    .expect("RUST_DECL_RE regex should compile")
});

static RUST_USE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub\s+)?use\s+([\w:]+)").expect("RUST_USE_RE regex should compile")
});

/// Per-language extraction capability.
pub trait SymbolExtractor: Send + Sync {
    /// Language class name, for logs.
    fn language(&self) -> &'static str;

    /// Declared identifier names, in source order.
    fn symbols(&self, content: &str) -> Vec<String>;

    /// Import specifiers as written, in source order, without duplicates.
    fn imports(&self, content: &str) -> Vec<String>;

    /// Candidate chunk ids a relative import may refer to.
    ///
    /// Returns an over-approximation; candidates that are not files in the
    /// repository simply never match a chunk. Non-relative specifiers
    /// resolve to nothing.
    fn resolve(&self, _importer: &str, _specifier: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Exported declarations and relative imports for TypeScript/JavaScript.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptExtractor;

impl SymbolExtractor for ScriptExtractor {
    fn language(&self) -> &'static str {
        "script"
    }

    fn symbols(&self, content: &str) -> Vec<String> {
        let mut symbols: Vec<String> = SCRIPT_DECL_RE
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .collect();

        for list in SCRIPT_EXPORT_LIST_RE.captures_iter(content) {
            for item in list[1].split(',') {
                // `a as b` exports `b`
                let name = item.rsplit(" as ").next().unwrap_or("").trim();
                let name = name.trim_start_matches("type ").trim();
                if !name.is_empty() && name != "default" && is_identifier(name) {
                    symbols.push(name.to_string());
                }
            }
        }
        symbols
    }

    fn imports(&self, content: &str) -> Vec<String> {
        let found = SCRIPT_FROM_RE
            .captures_iter(content)
            .chain(SCRIPT_BARE_IMPORT_RE.captures_iter(content))
            .chain(SCRIPT_CALL_IMPORT_RE.captures_iter(content))
            .map(|c| c[1].to_string());
        dedup(found)
    }

    fn resolve(&self, importer: &str, specifier: &str) -> Vec<String> {
        if !specifier.starts_with('.') {
            return Vec::new();
        }
        let Some(target) = join_relative(parent_dir(importer), specifier) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        match extension(&target) {
            Some(ext) if SCRIPT_EXTENSIONS.contains(&ext) || ext == "json" => {
                candidates.push(target.clone());
                // ESM TypeScript imports compiled `.js` names
                if matches!(ext, "js" | "jsx" | "mjs" | "cjs") {
                    let stem = &target[..target.len() - ext.len() - 1];
                    candidates.push(format!("{stem}.ts"));
                    candidates.push(format!("{stem}.tsx"));
                }
            }
            _ => {
                for ext in SCRIPT_EXTENSIONS {
                    candidates.push(format!("{target}.{ext}"));
                }
                for ext in SCRIPT_EXTENSIONS {
                    candidates.push(join_segments(&target, &format!("index.{ext}")));
                }
            }
        }
        candidates
    }
}

/// Module-level `class`/`def` declarations and imports for Python.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonExtractor;

impl SymbolExtractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn symbols(&self, content: &str) -> Vec<String> {
        PYTHON_DECL_RE
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .collect()
    }

    fn imports(&self, content: &str) -> Vec<String> {
        let found = PYTHON_IMPORT_RE.captures_iter(content).filter_map(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        });
        dedup(found)
    }

    fn resolve(&self, importer: &str, specifier: &str) -> Vec<String> {
        let dots = specifier.chars().take_while(|c| *c == '.').count();
        if dots == 0 {
            return Vec::new();
        }

        // One dot is the importer's package; each extra dot climbs a level.
        let mut base = parent_dir(importer).to_string();
        for _ in 1..dots {
            if base.is_empty() {
                return Vec::new();
            }
            base = parent_dir(&base).to_string();
        }

        let module = specifier[dots..].replace('.', "/");
        if module.is_empty() {
            return vec![join_segments(&base, "__init__.py")];
        }
        let target = join_segments(&base, &module);
        vec![
            format!("{target}.py"),
            join_segments(&target, "__init__.py"),
        ]
    }
}

/// Module-level `pub` items and `use` paths for Rust.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustExtractor;

impl SymbolExtractor for RustExtractor {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn symbols(&self, content: &str) -> Vec<String> {
        RUST_DECL_RE
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .collect()
    }

    fn imports(&self, content: &str) -> Vec<String> {
        dedup(RUST_USE_RE.captures_iter(content).map(|c| c[1].to_string()))
    }
}

/// Maps file extensions to extractors.
#[derive(Clone)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn SymbolExtractor>>,
}

impl ExtractorRegistry {
    /// Create a registry with no extractors.
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Register an extractor for the given extensions, replacing any previous one.
    pub fn register(&mut self, extensions: &[&str], extractor: Arc<dyn SymbolExtractor>) {
        for ext in extensions {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), Arc::clone(&extractor));
        }
    }

    /// The extractor for a path, by extension.
    pub fn for_path(&self, path: &str) -> Option<&dyn SymbolExtractor> {
        let ext = extension(path)?.to_ascii_lowercase();
        self.by_extension.get(&ext).map(|e| e.as_ref())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(&SCRIPT_EXTENSIONS, Arc::new(ScriptExtractor));
        registry.register(&["py"], Arc::new(PythonExtractor));
        registry.register(&["rs"], Arc::new(RustExtractor));
        registry
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&String> = self.by_extension.keys().collect();
        extensions.sort();
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

// ── Path helpers ────────────────────────────────────────────────────────

/// Directory part of a `/`-separated relative path.
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() { None } else { Some(ext) }
}

fn join_segments(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

/// Join a relative specifier onto a directory, resolving `.` and `..`.
///
/// Returns `None` when the result would climb above the repository root.
fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn is_identifier(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|i| seen.insert(i.clone())).collect()
}
