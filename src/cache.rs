//! Listing cache (component B): a time-bounded cache of remote directory
//! contents, keyed by absolute path, protected by a reader-writer lock.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::sftp_client::RemoteEntry;

const TTL: Duration = Duration::from_secs(30);

struct DirCacheEntry {
    entries: Vec<RemoteEntry>,
    cached_at: Instant,
}

pub struct ListingCache {
    entries: RwLock<HashMap<String, DirCacheEntry>>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::with_ttl(TTL)
    }

    /// Same as `new()` but with an overridden freshness window (§10.3
    /// `cache_ttl_secs`).
    pub fn with_ttl(ttl: Duration) -> Self {
        ListingCache { entries: RwLock::new(HashMap::new()), ttl }
    }

    /// Fresh hit → `Some(entries)`, else `None` (miss or expired).
    pub fn get(&self, path: &str) -> Option<Vec<RemoteEntry>> {
        let guard = self.entries.read().unwrap();
        let entry = guard.get(path)?;
        if entry.cached_at.elapsed() < self.ttl {
            tracing::debug!(path, "listing cache hit");
            Some(entry.entries.clone())
        } else {
            tracing::debug!(path, "listing cache stale");
            None
        }
    }

    pub fn insert(&self, path: &str, entries: Vec<RemoteEntry>) {
        tracing::debug!(path, count = entries.len(), "listing cache miss, populating");
        let mut guard = self.entries.write().unwrap();
        guard.insert(path.to_string(), DirCacheEntry { entries, cached_at: Instant::now() });
    }

    /// `ClearDirCache()` — drops everything.
    pub fn clear(&self) {
        tracing::debug!("listing cache cleared");
        self.entries.write().unwrap().clear();
    }

    /// `invalidateDirCache(p)` — drops one entry.
    pub fn invalidate(&self, path: &str) {
        tracing::debug!(path, "listing cache entry invalidated");
        self.entries.write().unwrap().remove(path);
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp_client::RemoteMetadata;

    fn entry(name: &str) -> RemoteEntry {
        RemoteEntry { name: name.to_string(), metadata: RemoteMetadata::default() }
    }

    #[test]
    fn miss_then_hit_then_invalidate() {
        let cache = ListingCache::new();
        assert!(cache.get("/a").is_none());
        cache.insert("/a", vec![entry("x")]);
        let got = cache.get("/a").expect("fresh hit");
        assert_eq!(got.len(), 1);
        cache.invalidate("/a");
        assert!(cache.get("/a").is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ListingCache::new();
        cache.insert("/a", vec![entry("x")]);
        cache.insert("/b", vec![entry("y")]);
        cache.clear();
        assert!(cache.get("/a").is_none());
        assert!(cache.get("/b").is_none());
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = ListingCache::new();
        cache.entries.write().unwrap().insert(
            "/a".to_string(),
            DirCacheEntry {
                entries: vec![entry("x")],
                cached_at: Instant::now() - Duration::from_secs(31),
            },
        );
        assert!(cache.get("/a").is_none());
    }
}
