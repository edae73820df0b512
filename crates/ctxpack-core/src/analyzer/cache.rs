//! Time-to-live cache of repo maps, keyed by repository root.
//!
//! The cache is owned by an analyzer instance rather than being global, and
//! reads time through a [`Clock`] so tests can control expiry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::model::RepoMap;

/// Source of the current instant.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Instant::now())
    }
}

struct CacheEntry {
    map: Arc<RepoMap>,
    expires_at: Instant,
}

/// Repo maps keyed by root with a fixed time-to-live.
pub struct RepoMapCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl RepoMapCache {
    /// Create a cache using the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached map for `root`, if present and not expired.
    ///
    /// Expired entries are evicted on lookup.
    pub fn get(&self, root: &Path) -> Option<Arc<RepoMap>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(root) {
            Some(entry) if now < entry.expires_at => return Some(Arc::clone(&entry.map)),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(root);
        }
        None
    }

    /// Store a map for `root`, replacing any previous entry.
    pub fn insert(&self, root: &Path, map: Arc<RepoMap>) {
        let expires_at = self.clock.now() + self.ttl;
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(root.to_path_buf(), CacheEntry { map, expires_at });
        }
    }

    /// Drop the entry for `root`. Returns whether one existed.
    pub fn invalidate(&self, root: &Path) -> bool {
        self.entries
            .lock()
            .map(|mut entries| entries.remove(root).is_some())
            .unwrap_or(false)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RepoMapCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoMapCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::SystemTime;

    fn empty_map(root: &str) -> Arc<RepoMap> {
        Arc::new(RepoMap {
            root: PathBuf::from(root),
            chunks: BTreeMap::new(),
            entry_points: Vec::new(),
            core_modules: Vec::new(),
            dependency_graph: BTreeMap::new(),
            reverse_dependency_graph: BTreeMap::new(),
            total_tokens: 0,
            analyzed_at: SystemTime::UNIX_EPOCH,
        })
    }

    #[test]
    fn test_hit_within_ttl() {
        let clock = ManualClock::new();
        let cache = RepoMapCache::with_clock(Duration::from_secs(60), Arc::new(clock.clone()));
        let root = Path::new("/repo");
        let map = empty_map("/repo");

        cache.insert(root, Arc::clone(&map));
        clock.advance(Duration::from_secs(59));

        let hit = cache.get(root).unwrap();
        assert!(Arc::ptr_eq(&hit, &map));
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let clock = ManualClock::new();
        let cache = RepoMapCache::with_clock(Duration::from_secs(60), Arc::new(clock.clone()));
        let root = Path::new("/repo");

        cache.insert(root, empty_map("/repo"));
        clock.advance(Duration::from_secs(60));

        assert!(cache.get(root).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_roots_are_independent() {
        let cache = RepoMapCache::new(Duration::from_secs(60));
        cache.insert(Path::new("/a"), empty_map("/a"));
        cache.insert(Path::new("/b"), empty_map("/b"));
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate(Path::new("/a")));
        assert!(!cache.invalidate(Path::new("/a")));
        assert!(cache.get(Path::new("/a")).is_none());
        assert!(cache.get(Path::new("/b")).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
