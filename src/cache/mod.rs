//! Hot-entry cache
//!
//! Caches task values by path. Entries carry an expiry, a last-access
//! stamp, and a size hint; eviction happens three ways:
//!
//! - TTL expiry, lazily on read and in the background cleanup pass
//! - explicit invalidation on commit (never before)
//! - pressure-driven reduction, oldest-by-last-access first
//!
//! Values are shared read-only: a mutation replaces the cached entry
//! rather than aliasing it. The cache is safe for concurrent use under
//! its internal lock; readers see atomic snapshots.

mod pressure;

pub use pressure::{combined_pressure, MemorySignal, PressureSample};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::model::Task;

/// One cached entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<Task>,
    expires_at: Instant,
    last_access: Instant,
    size_hint: usize,
}

/// Result of a pressure reduction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionOutcome {
    pub entries_removed: u64,
    pub bytes_saved: u64,
    pub trigger: String,
}

/// Counters describing the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// The task cache.
#[derive(Debug)]
pub struct TaskCache {
    inner: Mutex<CacheInner>,
    config: CacheConfig,
}

impl TaskCache {
    /// Empty cache with its tunables.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            config,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_millis(self.config.ttl_ms)
    }

    /// Read a task; touches last access on a hit, counts expired
    /// entries as misses and drops them.
    pub fn get(&self, path: &str) -> Option<Arc<Task>> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();
        match inner.entries.get_mut(path) {
            Some(entry) if entry.expires_at > now => {
                entry.last_access = now;
                let value = Arc::clone(&entry.value);
                inner.hits += 1;
                Some(value)
            }
            Some(_) => {
                if let Some(dead) = inner.entries.remove(path) {
                    inner.bytes = inner.bytes.saturating_sub(dead.size_hint);
                }
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a task. When the count or byte bound is hit,
    /// the oldest-by-last-access entries make room first.
    pub fn insert(&self, task: Arc<Task>) {
        let size_hint = serde_json::to_vec(task.as_ref()).map(|v| v.len()).unwrap_or(256);
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();

        if let Some(old) = inner.entries.remove(task.path.as_str()) {
            inner.bytes = inner.bytes.saturating_sub(old.size_hint);
        }
        while inner.entries.len() >= self.config.max_entries
            || inner.bytes + size_hint > self.config.max_bytes
        {
            if !evict_oldest(&mut inner) {
                break;
            }
        }

        inner.bytes += size_hint;
        inner.entries.insert(
            task.path.as_str().to_string(),
            CacheEntry {
                value: task,
                expires_at: now + self.ttl(),
                last_access: now,
                size_hint,
            },
        );
    }

    /// Drop one path.
    pub fn invalidate(&self, path: &str) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if let Some(entry) = inner.entries.remove(path) {
            inner.bytes = inner.bytes.saturating_sub(entry.size_hint);
        }
    }

    /// Drop many paths at once, as on commit or conservative rollback
    /// invalidation.
    pub fn invalidate_many<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        for path in paths {
            if let Some(entry) = inner.entries.remove(path.as_ref()) {
                inner.bytes = inner.bytes.saturating_sub(entry.size_hint);
            }
        }
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.clear();
        inner.bytes = 0;
    }

    /// Remove expired entries. Run from the background cleanup thread.
    pub fn cleanup(&self) -> u64 {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();
        let dead: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let removed = dead.len() as u64;
        for key in dead {
            if let Some(entry) = inner.entries.remove(&key) {
                inner.bytes = inner.bytes.saturating_sub(entry.size_hint);
            }
        }
        inner.evictions += removed;
        removed
    }

    /// Run a pressure reduction pass.
    ///
    /// Returns `None` while combined pressure is below the reduction
    /// threshold. Otherwise removes oldest-by-last-access entries until
    /// pressure falls under the floor or half the entries are gone,
    /// whichever comes first.
    pub fn reduce(&self, signal: &MemorySignal) -> Option<ReductionOutcome> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let start_count = inner.entries.len();
        if start_count == 0 {
            return None;
        }

        let sample = self.sample_locked(&inner, signal);
        if sample.combined < 0.5 {
            return None;
        }
        let trigger = sample.trigger();

        let max_removals = (start_count / 2) as u64;
        let bytes_before = inner.bytes;
        let mut removed = 0u64;
        while removed < max_removals {
            let sample = self.sample_locked(&inner, signal);
            if sample.combined < 0.3 {
                break;
            }
            if !evict_oldest(&mut inner) {
                break;
            }
            removed += 1;
        }
        let saved = bytes_before.saturating_sub(inner.bytes) as u64;
        inner.evictions += removed;

        Some(ReductionOutcome {
            entries_removed: removed,
            bytes_saved: saved,
            trigger,
        })
    }

    fn sample_locked(&self, inner: &CacheInner, signal: &MemorySignal) -> PressureSample {
        combined_pressure(
            signal.fraction(),
            inner.entries.len() as f64 / self.config.max_entries as f64,
            self.config.memory_high_water,
            self.config.pressure_high_water,
        )
    }

    /// Current pressure sample.
    pub fn pressure(&self, signal: &MemorySignal) -> PressureSample {
        let inner = self.inner.lock().expect("cache lock poisoned");
        self.sample_locked(&inner, signal)
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock poisoned");
        CacheStats {
            entries: inner.entries.len() as u64,
            bytes: inner.bytes as u64,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

/// Remove the entry with the oldest last access. Returns false on an
/// empty cache.
fn evict_oldest(inner: &mut CacheInner) -> bool {
    let victim = inner
        .entries
        .iter()
        .min_by_key(|(_, e)| e.last_access)
        .map(|(k, _)| k.clone());
    match victim {
        Some(key) => {
            if let Some(entry) = inner.entries.remove(&key) {
                inner.bytes = inner.bytes.saturating_sub(entry.size_hint);
            }
            true
        }
        None => false,
    }
}
