use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Time-to-live cache. Entries are only evicted when read after expiry.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert_at(&mut self, key: &str, value: V, ttl: Duration, now: Instant) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        if now > entry.expires_at {
            self.entries.remove(key);
            log::debug!("cache entry {} expired", key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Number of stored entries, expired ones included.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_before_expiry() {
        let mut cache = TtlCache::new();
        let now = Instant::now();
        cache.insert_at("shelves", 42, Duration::from_secs(10), now);

        assert_eq!(cache.get_at("shelves", now), Some(42));
        assert_eq!(cache.get_at("shelves", now + Duration::from_secs(10)), Some(42));
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let mut cache = TtlCache::new();
        let now = Instant::now();
        cache.insert_at("shelves", "data".to_string(), Duration::from_secs(10), now);
        cache.insert_at("other", "kept".to_string(), Duration::from_secs(10), now);

        let later = now + Duration::from_secs(11);
        assert_eq!(cache.get_at("shelves", later), None);
        assert_eq!(cache.len(), 1);
        // no sweep: unread expired entries stay until touched
        assert_eq!(cache.get_at("missing", later), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reinsert_refreshes_expiry() {
        let mut cache = TtlCache::new();
        let now = Instant::now();
        cache.insert_at("k", 1, Duration::from_secs(1), now);
        cache.insert_at("k", 2, Duration::from_secs(60), now + Duration::from_secs(2));

        assert_eq!(cache.get_at("k", now + Duration::from_secs(30)), Some(2));
    }
}
