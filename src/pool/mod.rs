//! Connection pool
//!
//! Multiplexes a bounded number of store handles across callers. Waiters
//! are woken in FIFO order; callers past the wait-queue bound fail
//! immediately with POOL_EXHAUSTED. Idle handles beyond the idle timeout
//! are closed down to the minimum size, and every handle is
//! health-checked on acquire; unhealthy handles are discarded and
//! replaced.

mod errors;

pub use errors::{PoolError, PoolResult};

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::config::PoolConfig;
use crate::store::TaskStore;

/// One pooled handle over the shared store.
#[derive(Debug)]
pub struct StoreHandle {
    id: u64,
    store: Arc<RwLock<TaskStore>>,
    created: Instant,
}

impl StoreHandle {
    /// The shared store behind this handle.
    pub fn store(&self) -> &Arc<RwLock<TaskStore>> {
        &self.store
    }

    /// Handle id, for logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Age of this handle.
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// A handle is healthy while the store lock is usable. A poisoned
    /// lock means a writer panicked mid-mutation; the handle is
    /// discarded rather than handed out.
    pub fn is_healthy(&self) -> bool {
        !self.store.is_poisoned()
    }
}

struct IdleEntry {
    handle: StoreHandle,
    idle_since: Instant,
}

struct PoolInner {
    idle: Vec<IdleEntry>,
    active: usize,
    waiting: usize,
    queue: VecDeque<u64>,
    next_ticket: u64,
    next_handle_id: u64,
    /// Lifetime counters
    acquired_total: u64,
    timeouts_total: u64,
    discarded_unhealthy: u64,
}

/// Gauges for the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub active: usize,
    pub idle: usize,
    pub waiting: usize,
    pub acquired_total: u64,
    pub timeouts_total: u64,
    pub discarded_unhealthy: u64,
}

/// The pool.
pub struct StorePool {
    store: Arc<RwLock<TaskStore>>,
    inner: Mutex<PoolInner>,
    available: Condvar,
    config: PoolConfig,
}

impl StorePool {
    /// Create a pool over a shared store, pre-opening `min_size`
    /// handles.
    pub fn new(store: Arc<RwLock<TaskStore>>, config: PoolConfig) -> Self {
        let mut inner = PoolInner {
            idle: Vec::new(),
            active: 0,
            waiting: 0,
            queue: VecDeque::new(),
            next_ticket: 0,
            next_handle_id: 0,
            acquired_total: 0,
            timeouts_total: 0,
            discarded_unhealthy: 0,
        };
        for _ in 0..config.min_size {
            let handle = StoreHandle {
                id: inner.next_handle_id,
                store: Arc::clone(&store),
                created: Instant::now(),
            };
            inner.next_handle_id += 1;
            inner.idle.push(IdleEntry {
                handle,
                idle_since: Instant::now(),
            });
        }
        Self {
            store,
            inner: Mutex::new(inner),
            available: Condvar::new(),
            config,
        }
    }

    /// Acquire a handle, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// - `POOL_EXHAUSTED` immediately when the wait queue is full
    /// - `TIMEOUT` when no handle frees up before the deadline
    pub fn acquire(&self, timeout: Duration) -> PoolResult<PooledHandle<'_>> {
        let mut inner = self.inner.lock().expect("pool lock poisoned");

        if inner.waiting >= self.config.max_waiting_clients {
            return Err(PoolError::Exhausted {
                waiting: inner.waiting,
            });
        }

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        inner.queue.push_back(ticket);
        inner.waiting += 1;

        let deadline = Instant::now() + timeout;
        loop {
            if inner.queue.front() == Some(&ticket) {
                if let Some(handle) = self.try_take(&mut inner) {
                    inner.queue.pop_front();
                    inner.waiting -= 1;
                    inner.active += 1;
                    inner.acquired_total += 1;
                    // The next waiter may also be satisfiable
                    self.available.notify_all();
                    return Ok(PooledHandle {
                        pool: self,
                        handle: Some(handle),
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                inner.queue.retain(|t| *t != ticket);
                inner.waiting -= 1;
                inner.timeouts_total += 1;
                return Err(PoolError::Timeout { waited: timeout });
            }

            let (guard, _) = self
                .available
                .wait_timeout(inner, deadline - now)
                .expect("pool lock poisoned");
            inner = guard;
        }
    }

    /// Take an idle handle (health-checked) or open a new one under the
    /// size bound.
    fn try_take(&self, inner: &mut PoolInner) -> Option<StoreHandle> {
        self.evict_idle(inner);
        while let Some(entry) = inner.idle.pop() {
            if entry.handle.is_healthy() {
                return Some(entry.handle);
            }
            inner.discarded_unhealthy += 1;
        }
        if inner.active + inner.idle.len() < self.config.max_size {
            let handle = StoreHandle {
                id: inner.next_handle_id,
                store: Arc::clone(&self.store),
                created: Instant::now(),
            };
            inner.next_handle_id += 1;
            return Some(handle);
        }
        None
    }

    /// Close idle handles past the idle timeout, never below min size.
    fn evict_idle(&self, inner: &mut PoolInner) {
        let idle_timeout = Duration::from_millis(self.config.idle_timeout_ms);
        let min_size = self.config.min_size;
        while inner.idle.len() + inner.active > min_size {
            let stale = inner
                .idle
                .iter()
                .position(|e| e.idle_since.elapsed() > idle_timeout);
            match stale {
                Some(pos) => {
                    inner.idle.remove(pos);
                }
                None => break,
            }
        }
    }

    fn release(&self, handle: StoreHandle) {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        inner.active -= 1;
        if handle.is_healthy() {
            inner.idle.push(IdleEntry {
                handle,
                idle_since: Instant::now(),
            });
        } else {
            inner.discarded_unhealthy += 1;
        }
        self.evict_idle(&mut inner);
        self.available.notify_all();
    }

    /// Pool gauges.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().expect("pool lock poisoned");
        PoolStats {
            active: inner.active,
            idle: inner.idle.len(),
            waiting: inner.waiting,
            acquired_total: inner.acquired_total,
            timeouts_total: inner.timeouts_total,
            discarded_unhealthy: inner.discarded_unhealthy,
        }
    }
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("StorePool")
            .field("active", &stats.active)
            .field("idle", &stats.idle)
            .field("waiting", &stats.waiting)
            .finish()
    }
}

/// An acquired handle; released back to the pool on drop.
#[derive(Debug)]
pub struct PooledHandle<'a> {
    pool: &'a StorePool,
    handle: Option<StoreHandle>,
}

impl PooledHandle<'_> {
    /// The handle.
    pub fn handle(&self) -> &StoreHandle {
        self.handle.as_ref().expect("handle taken")
    }

    /// The shared store behind the handle.
    pub fn store(&self) -> &Arc<RwLock<TaskStore>> {
        self.handle().store()
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pool(config: PoolConfig) -> (StorePool, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RwLock::new(TaskStore::open(dir.path()).unwrap()));
        (StorePool::new(store, config), dir)
    }

    #[test]
    fn acquire_and_release_cycle() {
        let (pool, _dir) = pool(PoolConfig::default());
        {
            let handle = pool.acquire(Duration::from_millis(100)).unwrap();
            assert!(handle.handle().is_healthy());
            assert_eq!(pool.stats().active, 1);
        }
        assert_eq!(pool.stats().active, 0);
        assert!(pool.stats().idle >= 1);
    }

    #[test]
    fn capacity_hit_times_out() {
        let config = PoolConfig {
            min_size: 0,
            max_size: 1,
            ..PoolConfig::default()
        };
        let (pool, _dir) = pool(config);
        let _held = pool.acquire(Duration::from_millis(100)).unwrap();
        let err = pool.acquire(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));
        assert_eq!(pool.stats().timeouts_total, 1);
    }

    #[test]
    fn release_wakes_waiter() {
        let config = PoolConfig {
            min_size: 0,
            max_size: 1,
            ..PoolConfig::default()
        };
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RwLock::new(TaskStore::open(dir.path()).unwrap()));
        let pool = Arc::new(StorePool::new(store, config));

        let held = pool.acquire(Duration::from_millis(100)).unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.acquire(Duration::from_secs(5)).map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(50));
        drop(held);
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn wait_queue_bound_fails_fast() {
        let config = PoolConfig {
            min_size: 0,
            max_size: 1,
            max_waiting_clients: 1,
            ..PoolConfig::default()
        };
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RwLock::new(TaskStore::open(dir.path()).unwrap()));
        let pool = Arc::new(StorePool::new(store, config));

        let _held = pool.acquire(Duration::from_millis(100)).unwrap();
        // One waiter parked in the queue
        let parked = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let _ = pool.acquire(Duration::from_millis(500));
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        let err = pool.acquire(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
        parked.join().unwrap();
    }

    #[test]
    fn fifo_order_among_waiters() {
        let config = PoolConfig {
            min_size: 0,
            max_size: 1,
            max_waiting_clients: 8,
            ..PoolConfig::default()
        };
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RwLock::new(TaskStore::open(dir.path()).unwrap()));
        let pool = Arc::new(StorePool::new(store, config));
        let order = Arc::new(Mutex::new(Vec::new()));

        let held = pool.acquire(Duration::from_millis(100)).unwrap();
        let mut threads = Vec::new();
        for tag in 0..3 {
            let pool = Arc::clone(&pool);
            let order = Arc::clone(&order);
            threads.push(std::thread::spawn(move || {
                let guard = pool.acquire(Duration::from_secs(5)).unwrap();
                order.lock().unwrap().push(tag);
                std::thread::sleep(Duration::from_millis(20));
                drop(guard);
            }));
            // Stagger arrival so queue order is deterministic
            std::thread::sleep(Duration::from_millis(40));
        }
        drop(held);
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
