//! TTL-keyed cache of resolved screen regions.
//!
//! Panels and other named regions rarely move within a short window, so
//! their resolved bounds are cached to avoid repeated vision calls. Entries
//! are evicted lazily on read; callers always receive copies, never shared
//! references into the store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::display::types::Rect;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Alias folding for common panel names, applied after lowercasing.
const ALIASES: &[(&str, &str)] = &[
    ("debug console", "console"),
    ("output console", "console"),
    ("code editor", "editor"),
    ("editor panel", "editor"),
    ("file explorer", "explorer"),
    ("project explorer", "explorer"),
    ("terminal panel", "terminal"),
    ("integrated terminal", "terminal"),
];

#[derive(Debug, Clone)]
struct CacheEntry {
    region: Rect,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

pub struct LocationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl LocationCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns a copy of the cached region, or `None` on a miss or an
    /// expired entry (which is evicted as a side effect). Misses are not
    /// errors; the caller performs a live lookup.
    pub fn get(&self, name: &str) -> Option<Rect> {
        let key = normalize(name);
        let mut entries = self.lock();
        match entries.get(&key) {
            Some(entry) if !entry.expired(Instant::now()) => Some(entry.region),
            Some(_) => {
                tracing::debug!(key = %key, "cache entry expired, evicting");
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Stores with the cache's default TTL, overwriting any existing entry
    /// for the normalized key.
    pub fn put(&self, name: &str, region: Rect) {
        self.put_with_ttl(name, region, self.default_ttl);
    }

    /// Explicit per-entry TTL override.
    pub fn put_with_ttl(&self, name: &str, region: Rect, ttl: Duration) {
        let key = normalize(name);
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "caching region");
        self.lock().insert(
            key,
            CacheEntry {
                region,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Clears one entry, or all entries when no name is given.
    pub fn invalidate(&self, name: Option<&str>) {
        let mut entries = self.lock();
        match name {
            Some(name) => {
                entries.remove(&normalize(name));
            }
            None => entries.clear(),
        }
    }
}

impl Default for LocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

fn normalize(name: &str) -> String {
    let folded = name.trim().to_lowercase();
    for (alias, canonical) in ALIASES {
        if folded == *alias {
            return (*canonical).to_string();
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn region(x: f64) -> Rect {
        Rect::new(x, 100.0, 400.0, 300.0)
    }

    #[test]
    fn hit_immediately_after_put_is_exact() {
        let cache = LocationCache::new(Duration::from_secs(5));
        cache.put("Console", region(10.0));
        assert_eq!(cache.get("Console"), Some(region(10.0)));
    }

    #[test]
    fn expired_entry_misses_and_evicts() {
        let cache = LocationCache::default();
        cache.put_with_ttl("Console", region(10.0), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(15));
        assert_eq!(cache.get("Console"), None);
        // Evicted, not just hidden: a fresh put works as usual.
        cache.put("Console", region(20.0));
        assert_eq!(cache.get("Console"), Some(region(20.0)));
    }

    #[test]
    fn keys_are_case_and_alias_folded() {
        let cache = LocationCache::default();
        cache.put("  CONSOLE ", region(1.0));
        assert_eq!(cache.get("console"), Some(region(1.0)));
        assert_eq!(cache.get("Debug Console"), Some(region(1.0)));

        cache.put("Integrated Terminal", region(2.0));
        assert_eq!(cache.get("terminal"), Some(region(2.0)));
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let cache = LocationCache::default();
        cache.put("editor", region(1.0));
        cache.put("Code Editor", region(2.0));
        assert_eq!(cache.get("editor"), Some(region(2.0)));
    }

    #[test]
    fn invalidate_one_and_all() {
        let cache = LocationCache::default();
        cache.put("console", region(1.0));
        cache.put("editor", region(2.0));

        cache.invalidate(Some("console"));
        assert_eq!(cache.get("console"), None);
        assert_eq!(cache.get("editor"), Some(region(2.0)));

        cache.invalidate(None);
        assert_eq!(cache.get("editor"), None);
    }
}
