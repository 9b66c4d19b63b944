//! Result cache
//!
//! Bounded cache keyed by query fingerprint. Entries expire after the
//! TTL; when the cache is full the oldest-by-insertion entry is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

struct CachedResult {
    value: Value,
    inserted: Instant,
}

struct ResultCacheInner {
    entries: HashMap<String, CachedResult>,
    insertion_order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// The result cache.
pub struct ResultCache {
    inner: Mutex<ResultCacheInner>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    /// Empty cache.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(ResultCacheInner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
            ttl,
            max_entries,
        }
    }

    /// Fetch a non-expired result.
    pub fn get(&self, fingerprint: &str) -> Option<Value> {
        let mut inner = self.inner.lock().expect("result cache lock poisoned");
        let fresh = match inner.entries.get(fingerprint) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                inner.misses += 1;
                return None;
            }
        };
        match fresh {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.entries.remove(fingerprint);
                inner.insertion_order.retain(|k| k != fingerprint);
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a result, evicting oldest-by-insertion beyond capacity.
    pub fn insert(&self, fingerprint: String, value: Value) {
        let mut inner = self.inner.lock().expect("result cache lock poisoned");
        if inner.entries.contains_key(&fingerprint) {
            inner.insertion_order.retain(|k| k != &fingerprint);
        }
        while inner.entries.len() >= self.max_entries {
            match inner.insertion_order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.insertion_order.push_back(fingerprint.clone());
        inner.entries.insert(
            fingerprint,
            CachedResult {
                value,
                inserted: Instant::now(),
            },
        );
    }

    /// Drop everything; write commits call this to keep reads coherent.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("result cache lock poisoned");
        inner.entries.clear();
        inner.insertion_order.clear();
    }

    /// (hits, misses) counters.
    pub fn counters(&self) -> (u64, u64) {
        let inner = self.inner.lock().expect("result cache lock poisoned");
        (inner.hits, inner.misses)
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("result cache lock poisoned")
            .entries
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hit_then_expire() {
        let cache = ResultCache::new(Duration::from_millis(20), 8);
        cache.insert("fp1".to_string(), json!(1));
        assert_eq!(cache.get("fp1"), Some(json!(1)));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("fp1"), None);
    }

    #[test]
    fn capacity_evicts_oldest_insertion() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("c".to_string(), json!(3));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn reinsert_refreshes_position() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("a".to_string(), json!(10));
        cache.insert("c".to_string(), json!(3));
        // b was oldest after a's refresh
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(json!(10)));
    }
}
