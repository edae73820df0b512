//! Glob matching for include/exclude and classification patterns.
//!
//! Patterns are translated into regexes anchored against the whole
//! repo-relative path (always `/`-separated):
//!
//! - `**/` matches zero or more leading directories
//! - `/**` at the end matches the directory itself and everything below it
//! - a bare `**` matches anything, across segments
//! - `*` matches within a single path segment
//! - `?` matches exactly one non-separator character
//!
//! Everything else is matched literally.

use regex::Regex;

/// Errors from glob compilation.
#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|source| GlobError::Invalid {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The original glob text.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the relative path matches this pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// An ordered list of patterns; a path matches if any pattern matches.
#[derive(Debug, Clone, Default)]
pub struct GlobMatcher {
    patterns: Vec<GlobPattern>,
}

impl GlobMatcher {
    /// Compile every pattern, failing on the first invalid one.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        let patterns = patterns
            .iter()
            .map(|p| GlobPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern matches the relative path.
    pub fn is_match(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(path))
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the matcher has no patterns (and therefore matches nothing).
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Regex for `**/`: zero or more leading directories.
const ANY_DIRS: &str = "(?:.*/)?";

/// Translate a glob into an anchored regex source string.
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                let followed_by_slash = chars.get(i + 2) == Some(&'/');
                if at_segment_start && followed_by_slash {
                    // `**/`: zero or more directories
                    out.push_str(ANY_DIRS);
                    i += 3;
                } else if i > 0 && chars[i - 1] == '/' && i + 2 == chars.len() {
                    // trailing `/**`: the directory itself or anything below.
                    // A preceding `**/` already consumed the '/'.
                    if out.ends_with(ANY_DIRS) {
                        out.truncate(out.len() - ANY_DIRS.len());
                    }
                    if out.ends_with('/') {
                        out.pop();
                        out.push_str("(?:/.*)?");
                    } else {
                        out.push_str(".*");
                    }
                    i += 2;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        GlobPattern::new(pattern).unwrap().is_match(path)
    }

    #[test]
    fn test_double_star_extension() {
        assert!(matches("**/*.ts", "a/b/c.ts"));
        assert!(matches("**/*.ts", "c.ts"));
        assert!(!matches("**/*.ts", "a/b/c.js"));
        assert!(!matches("**/*.ts", "a/b/c.tsx"));
    }

    #[test]
    fn test_excluded_segment() {
        let p = "**/node_modules/**";
        assert!(matches(p, "node_modules"));
        assert!(matches(p, "node_modules/react/index.js"));
        assert!(matches(p, "packages/web/node_modules/x.js"));
        assert!(!matches(p, "src/node_modules_helper.ts"));
        assert!(!matches(p, "src/my_node_modules/x.ts"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("src/*.ts", "src/a.ts"));
        assert!(!matches("src/*.ts", "src/nested/a.ts"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("file?.rs", "file1.rs"));
        assert!(!matches("file?.rs", "file12.rs"));
        assert!(!matches("a?b", "a/b"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        assert!(matches("**/*.d.ts", "types/index.d.ts"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("(x)+[y].md", "(x)+[y].md"));
    }

    #[test]
    fn test_inner_double_star() {
        assert!(matches("src/**/mod.rs", "src/mod.rs"));
        assert!(matches("src/**/mod.rs", "src/a/b/mod.rs"));
        assert!(!matches("src/**/mod.rs", "lib/a/mod.rs"));
        assert!(matches("**/**", "a/b.ts"));
        assert!(matches("**/**", "b.ts"));
        assert!(matches("src/**/**", "src/a/b.ts"));
        assert!(matches("src/**/**", "src"));
        assert!(!matches("src/**/**", "lib/a.ts"));
        assert_eq!(glob_to_regex("src/**/**"), glob_to_regex("src/**"));
    }

    #[test]
    fn test_anchored() {
        assert!(!matches("*.md", "docs/readme.md"));
        assert!(matches("*.md", "readme.md"));
    }

    #[test]
    fn test_matcher_any() {
        let m = GlobMatcher::new(&["**/*.ts", "**/*.py"]).unwrap();
        assert_eq!(m.len(), 2);
        assert!(m.is_match("x/y.py"));
        assert!(!m.is_match("x/y.go"));
        assert!(!GlobMatcher::default().is_match("anything"));
    }
}
