//! Task engine
//!
//! The process-wide state bundle: configuration, durable store, index
//! set, cache, pool, query executor, transaction coordinator, backup
//! scheduler, event bus, logger, and metrics — wired at bootstrap and
//! torn down explicitly. Request handlers receive the engine as context;
//! nothing here is an ambient global.
//!
//! Writes to a single task path are totally ordered through a per-path
//! lock table held from the state read through the commit; across paths,
//! the commit order on the durable store is authoritative. Event
//! publication and cache invalidation happen after the durable commit
//! and before the call returns.

mod context;
mod deps;
mod maintenance;
mod records;
mod tasks;

pub use context::RequestContext;
pub use maintenance::{EngineStats, MaintenanceReport};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::backup::BackupScheduler;
use crate::cache::{MemorySignal, TaskCache};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus, SubscriptionHandle};
use crate::index::IndexSet;
use crate::observability::{Logger, MetricsRegistry};
use crate::pool::StorePool;
use crate::query::QueryExecutor;
use crate::store::TaskStore;
use crate::txn::{AtomicityMode, RollbackManager, Transaction, TransactionCoordinator};

/// The engine.
pub struct TaskEngine {
    config: Arc<Config>,
    store: Arc<RwLock<TaskStore>>,
    indexes: Arc<RwLock<IndexSet>>,
    cache: Arc<TaskCache>,
    memory: Arc<MemorySignal>,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRegistry>,
    logger: Arc<Logger>,
    pool: Arc<StorePool>,
    query: Arc<QueryExecutor>,
    coordinator: Arc<TransactionCoordinator>,
    backup: Arc<BackupScheduler>,
    /// Per-path write ordering
    path_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Serialises whole write transactions
    write_lock: Mutex<()>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    backup_subscription: SubscriptionHandle,
}

impl TaskEngine {
    /// Bootstrap the engine: open the store, rebuild indexes, wire the
    /// subsystems, and start the background worker.
    pub fn bootstrap(config: Config) -> EngineResult<Arc<Self>> {
        let config = Arc::new(config);
        let logger = Arc::new(Logger::new(&config.log));
        let metrics = Arc::new(MetricsRegistry::new());
        let events = Arc::new(EventBus::new(config.events.max_event_listeners));

        let store = TaskStore::open(&config.store.store_dir)?;
        if let Some(tail) = &store.recovery_report().truncated_tail {
            logger.warn(
                "wal_tail_truncated",
                &[
                    ("valid_up_to", tail.valid_up_to.to_string()),
                    ("reason", tail.reason.clone()),
                ],
            );
        }
        let store = Arc::new(RwLock::new(store));

        let mut indexes = IndexSet::new(
            config.limits.max_path_depth,
            config.limits.max_children,
        );
        {
            let guard = store
                .read()
                .map_err(|_| EngineError::internal("bootstrap", "store lock poisoned"))?;
            indexes.rebuild(&guard)?;
        }
        let indexes = Arc::new(RwLock::new(indexes));

        let cache = Arc::new(TaskCache::new(config.cache.clone()));
        let memory = Arc::new(MemorySignal::new());
        let pool = Arc::new(StorePool::new(Arc::clone(&store), config.pool.clone()));
        let query = Arc::new(QueryExecutor::new(
            config.query.clone(),
            Arc::clone(&logger),
            Arc::clone(&metrics),
        ));

        let rollback = RollbackManager::new(config.transaction.clone());
        let coordinator = Arc::new(TransactionCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&indexes),
            Arc::clone(&cache),
            Arc::clone(&events),
            Arc::clone(&metrics),
            rollback,
        ));

        let backup = Arc::new(BackupScheduler::new(
            Arc::clone(&store),
            config.backup.clone(),
            Arc::clone(&events),
            Arc::clone(&logger),
            Arc::clone(&metrics),
        ));
        let backup_subscription = {
            let backup = Arc::clone(&backup);
            events.subscribe(move |event| {
                if matches!(event, EngineEvent::WriteCommitted { .. }) {
                    backup.note_write();
                }
            })?
        };

        let engine = Arc::new(Self {
            config,
            store,
            indexes,
            cache,
            memory,
            events,
            metrics,
            logger,
            pool,
            query,
            coordinator,
            backup,
            path_locks: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            backup_subscription,
        });
        Self::spawn_worker(&engine);
        engine.logger.info("engine_started", &[]);
        Ok(engine)
    }

    /// Background worker: cache cleanup, pressure reduction, backup
    /// debounce ticks, and the backup health check.
    fn spawn_worker(engine: &Arc<Self>) {
        let worker = Arc::clone(engine);
        let handle = std::thread::spawn(move || {
            let mut last_cleanup = Instant::now();
            let mut last_health = Instant::now();
            let cleanup_every = Duration::from_millis(worker.config.cache.cleanup_interval_ms);
            let health_every = Duration::from_millis(worker.config.backup.health_interval_ms);
            while !worker.shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(50));
                worker.backup.tick();
                if last_cleanup.elapsed() >= cleanup_every {
                    last_cleanup = Instant::now();
                    worker.cache.cleanup();
                    worker.reduce_cache_pressure();
                }
                if last_health.elapsed() >= health_every {
                    last_health = Instant::now();
                    worker.backup.health_check();
                }
            }
        });
        engine
            .workers
            .lock()
            .expect("worker registry poisoned")
            .push(handle);
    }

    /// Run one pressure evaluation, publishing events on reduction.
    pub fn reduce_cache_pressure(&self) {
        let sample = self.cache.pressure(&self.memory);
        if sample.combined >= 0.5 {
            self.events
                .publish(&EngineEvent::MemoryPressure { score: sample.combined });
        }
        if let Some(outcome) = self.cache.reduce(&self.memory) {
            self.metrics.inc_cache_reductions();
            self.events.publish(&EngineEvent::CacheReduction {
                entries_removed: outcome.entries_removed,
                bytes_saved: outcome.bytes_saved,
                trigger: outcome.trigger,
            });
        }
    }

    /// Stop the background worker, drop all event listeners, and flush
    /// the store with a final checkpoint.
    pub fn teardown(&self) -> EngineResult<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().expect("worker registry poisoned");
            guard.drain(..).collect()
        };
        for worker in workers {
            let _ = worker.join();
        }
        self.events.unsubscribe(self.backup_subscription);
        self.events.clear();
        let mut store = self
            .store
            .write()
            .map_err(|_| EngineError::internal("teardown", "store lock poisoned"))?;
        store.checkpoint()?;
        self.logger.info("engine_stopped", &[]);
        Ok(())
    }

    // Shared-state accessors used by the api layer, the CLI, and tests.

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The metrics registry.
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// The logger.
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// The connection pool.
    pub fn pool(&self) -> &Arc<StorePool> {
        &self.pool
    }

    /// The query executor.
    pub fn query(&self) -> &Arc<QueryExecutor> {
        &self.query
    }

    /// The cache.
    pub fn cache(&self) -> &Arc<TaskCache> {
        &self.cache
    }

    /// The memory gauge feeding the pressure model.
    pub fn memory_signal(&self) -> &Arc<MemorySignal> {
        &self.memory
    }

    /// The index set.
    pub fn indexes(&self) -> &Arc<RwLock<IndexSet>> {
        &self.indexes
    }

    /// The durable store.
    pub fn store(&self) -> &Arc<RwLock<TaskStore>> {
        &self.store
    }

    /// The backup scheduler.
    pub fn backup(&self) -> &Arc<BackupScheduler> {
        &self.backup
    }

    /// The per-path write lock.
    pub(crate) fn lock_path(&self, path: &str) -> Arc<Mutex<()>> {
        let mut locks = self.path_locks.lock().expect("path lock table poisoned");
        Arc::clone(locks.entry(path.to_string()).or_default())
    }

    /// Run a write transaction. `build` reads the current state, plans
    /// the mutation, and stages ops; it runs with the engine write lock
    /// and the per-path lock already held, so the state it reads cannot
    /// change before the commit. Plans are never computed from a
    /// snapshot another writer can invalidate.
    pub(crate) fn with_txn<T, F>(&self, primary_path: Option<&str>, build: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Transaction) -> EngineResult<T>,
    {
        let _write = self.write_lock.lock().expect("write lock poisoned");
        let _path_guard = primary_path.map(|p| self.lock_path(p));
        let _path_held = _path_guard.as_ref().map(|l| l.lock().expect("path lock poisoned"));

        let mut txn = self.coordinator.begin(AtomicityMode::Atomic)?;
        match build(&mut txn) {
            Ok(value) => {
                self.coordinator.commit(&mut txn)?;
                Ok(value)
            }
            Err(e) => {
                let _ = self.coordinator.rollback(&mut txn);
                Err(e)
            }
        }
    }

    /// Stage one op on an open transaction.
    pub(crate) fn stage(
        &self,
        txn: &mut Transaction,
        op: crate::txn::TxOp,
    ) -> EngineResult<()> {
        self.coordinator.execute(txn, op)
    }
}

impl std::fmt::Debug for TaskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEngine")
            .field("store_dir", &self.config.store.store_dir)
            .finish()
    }
}
