//! Coordinator implementation
//!
//! Operations are staged on the transaction and applied at commit:
//! durable store first, secondary indexes next, primary index last.
//! Every staged operation gets a per-operation result entry during the
//! apply. Any index failure hands the transaction to the rollback
//! manager, which restores the captured pre-state in reverse order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use uuid::Uuid;

use crate::cache::TaskCache;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::index::IndexSet;
use crate::model::{task_key, DependencyEdge, Task};
use crate::observability::MetricsRegistry;
use crate::store::{StoreBatch, TaskStore};

use super::errors::TxnError;
use super::rollback::RollbackManager;

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    RollingBack,
    RolledBack,
    Failed,
}

/// Index participation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicityMode {
    /// Store + every index, compensated on failure
    Atomic,
    /// Store + primary index only
    BestEffort,
}

/// One staged operation.
#[derive(Debug, Clone)]
pub enum TxOp {
    /// Insert or replace a task
    UpsertTask(Arc<Task>),
    /// Remove a task
    DeleteTask { id: String, path: String },
    /// Write a non-task entity record
    PutRecord { key: String, body: Value },
    /// Remove a non-task entity record
    DeleteRecord { key: String },
    /// Add a dependency edge
    AddEdge(DependencyEdge),
    /// Remove a dependency edge
    RemoveEdge { source: String, target: String },
}

impl TxOp {
    /// Operation name for result entries.
    pub fn name(&self) -> &'static str {
        match self {
            TxOp::UpsertTask(_) => "upsert_task",
            TxOp::DeleteTask { .. } => "delete_task",
            TxOp::PutRecord { .. } => "put_record",
            TxOp::DeleteRecord { .. } => "delete_record",
            TxOp::AddEdge(_) => "add_edge",
            TxOp::RemoveEdge { .. } => "remove_edge",
        }
    }

    /// The store key this op writes, if any.
    fn store_key(&self) -> Option<String> {
        match self {
            TxOp::UpsertTask(task) => Some(task_key(task.path.as_str())),
            TxOp::DeleteTask { path, .. } => Some(task_key(path)),
            TxOp::PutRecord { key, .. } => Some(key.clone()),
            TxOp::DeleteRecord { key } => Some(key.clone()),
            TxOp::AddEdge(_) | TxOp::RemoveEdge { .. } => None,
        }
    }

    /// The task path this op touches, if any.
    fn task_path(&self) -> Option<String> {
        match self {
            TxOp::UpsertTask(task) => Some(task.path.as_str().to_string()),
            TxOp::DeleteTask { path, .. } => Some(path.clone()),
            TxOp::AddEdge(edge) => Some(edge.source.clone()),
            TxOp::RemoveEdge { source, .. } => Some(source.clone()),
            _ => None,
        }
    }
}

/// Per-operation result entry.
#[derive(Debug, Clone)]
pub struct OpResult {
    pub index: usize,
    pub operation: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Captured pre-image of one touched task path.
#[derive(Debug, Clone)]
pub(crate) struct TaskPreState {
    pub task: Option<Arc<Task>>,
    /// Every edge touching the path, both directions
    pub edges: Vec<DependencyEdge>,
    /// The in-tree parent id the task was linked under
    pub parent_id: Option<String>,
}

/// An in-flight transaction.
#[derive(Debug)]
pub struct Transaction {
    pub id: String,
    state: TxnState,
    mode: AtomicityMode,
    ops: Vec<TxOp>,
    results: Vec<OpResult>,
    pub(crate) pre_tasks: BTreeMap<String, TaskPreState>,
    pub(crate) pre_records: BTreeMap<String, Option<Value>>,
    pending_events: Vec<EngineEvent>,
}

impl Transaction {
    /// The state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Staged op count.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queue an event to publish after a successful commit.
    pub fn push_event(&mut self, event: EngineEvent) {
        self.pending_events.push(event);
    }

    /// Store keys touched by the staged ops.
    pub fn touched_keys(&self) -> Vec<String> {
        self.pre_records.keys().cloned().collect()
    }

    /// Task paths touched by the staged ops.
    pub fn touched_paths(&self) -> Vec<String> {
        self.pre_tasks.keys().cloned().collect()
    }

    /// The staged ops, for the rollback manager.
    pub(crate) fn ops_for_compensation(&self) -> &[TxOp] {
        &self.ops
    }
}

/// Commit outcome handed back to the caller.
#[derive(Debug, Clone)]
pub struct TxnOutcome {
    pub transaction_id: String,
    pub results: Vec<OpResult>,
    pub keys: Vec<String>,
}

/// The coordinator.
pub struct TransactionCoordinator {
    store: Arc<RwLock<TaskStore>>,
    indexes: Arc<RwLock<IndexSet>>,
    cache: Arc<TaskCache>,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRegistry>,
    rollback: RollbackManager,
    active: Mutex<Option<String>>,
}

impl TransactionCoordinator {
    /// Wire the coordinator over the shared state.
    pub fn new(
        store: Arc<RwLock<TaskStore>>,
        indexes: Arc<RwLock<IndexSet>>,
        cache: Arc<TaskCache>,
        events: Arc<EventBus>,
        metrics: Arc<MetricsRegistry>,
        rollback: RollbackManager,
    ) -> Self {
        Self {
            store,
            indexes,
            cache,
            events,
            metrics,
            rollback,
            active: Mutex::new(None),
        }
    }

    /// The shared index set.
    pub fn indexes(&self) -> &Arc<RwLock<IndexSet>> {
        &self.indexes
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<RwLock<TaskStore>> {
        &self.store
    }

    /// The event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// `TRANSACTION_ALREADY_ACTIVE` while another transaction is open.
    pub fn begin(&self, mode: AtomicityMode) -> EngineResult<Transaction> {
        let mut active = self.active.lock().expect("txn registry lock poisoned");
        if let Some(active_id) = active.as_ref() {
            return Err(TxnError::AlreadyActive {
                active_id: active_id.clone(),
            }
            .into());
        }
        let id = Uuid::new_v4().to_string();
        *active = Some(id.clone());
        Ok(Transaction {
            id,
            state: TxnState::Active,
            mode,
            ops: Vec::new(),
            results: Vec::new(),
            pre_tasks: BTreeMap::new(),
            pre_records: BTreeMap::new(),
            pending_events: Vec::new(),
        })
    }

    /// Stage an operation, capturing pre-state on first touch.
    pub fn execute(&self, txn: &mut Transaction, op: TxOp) -> EngineResult<()> {
        if txn.state != TxnState::Active {
            return Err(TxnError::NoActiveTransaction.into());
        }
        let indexes = self
            .indexes
            .read()
            .map_err(|_| EngineError::internal("txn.execute", "index lock poisoned"))?;
        let store = self
            .store
            .read()
            .map_err(|_| EngineError::internal("txn.execute", "store lock poisoned"))?;

        if let Some(key) = op.store_key() {
            txn.pre_records
                .entry(key.clone())
                .or_insert_with(|| store.get(&key).map(|r| r.body.clone()));
        }
        if let Some(path) = op.task_path() {
            capture_task_pre_state(&indexes, &store, txn, &path);
        }
        // An upsert can also disturb the entry its id is currently bound
        // to; capture that path so compensation can restore it.
        if let TxOp::UpsertTask(t) = &op {
            if let Some(bound) = indexes.primary.get_by_id(&t.id) {
                if bound.path.as_str() != t.path.as_str() {
                    let bound_path = bound.path.as_str().to_string();
                    capture_task_pre_state(&indexes, &store, txn, &bound_path);
                }
            }
        }

        txn.ops.push(op);
        Ok(())
    }

    /// Commit: store, secondaries, primary. On any index failure the
    /// rollback manager restores the pre-state and the caller observes
    /// the original error.
    pub fn commit(&self, txn: &mut Transaction) -> EngineResult<TxnOutcome> {
        if txn.state != TxnState::Active {
            return Err(TxnError::NoActiveTransaction.into());
        }

        let mut store = self
            .store
            .write()
            .map_err(|_| EngineError::internal("txn.commit", "store lock poisoned"))?;
        let mut indexes = self
            .indexes
            .write()
            .map_err(|_| EngineError::internal("txn.commit", "index lock poisoned"))?;

        // Step 1: durable store, atomically.
        let mut batch = StoreBatch::new();
        for op in &txn.ops {
            match op {
                TxOp::UpsertTask(task) => {
                    let body = serde_json::to_value(task.as_ref())
                        .map_err(|e| EngineError::internal("txn.commit", e.to_string()))?;
                    batch.put(task_key(task.path.as_str()), body);
                }
                TxOp::DeleteTask { path, .. } => {
                    batch.delete(task_key(path));
                }
                TxOp::PutRecord { key, body } => {
                    batch.put(key.clone(), body.clone());
                }
                TxOp::DeleteRecord { key } => {
                    batch.delete(key.clone());
                }
                TxOp::AddEdge(_) | TxOp::RemoveEdge { .. } => {}
            }
        }
        if let Err(e) = store.apply(batch) {
            txn.state = TxnState::Failed;
            self.clear_active(&txn.id);
            self.cache.invalidate_many(txn.touched_paths());
            return Err(e.into());
        }

        // Step 2: secondary indexes, op order.
        let mut failure: Option<(usize, EngineError)> = None;
        if txn.mode == AtomicityMode::Atomic {
            for (position, op) in txn.ops.iter().enumerate() {
                match apply_secondary(&mut indexes, op) {
                    Ok(()) => txn.results.push(OpResult {
                        index: position,
                        operation: op.name().to_string(),
                        success: true,
                        error: None,
                    }),
                    Err(e) => {
                        txn.results.push(OpResult {
                            index: position,
                            operation: op.name().to_string(),
                            success: false,
                            error: Some(e.to_string()),
                        });
                        failure = Some((position, e));
                        break;
                    }
                }
            }
        }

        // Step 3: primary index, last.
        if failure.is_none() {
            for (position, op) in txn.ops.iter().enumerate() {
                if let Err(e) = apply_primary(&mut indexes, op) {
                    if let Some(entry) = txn.results.get_mut(position) {
                        entry.success = false;
                        entry.error = Some(e.to_string());
                    }
                    failure = Some((position, e));
                    break;
                }
            }
        }

        if let Some((_, original)) = failure {
            return self.run_rollback(txn, &mut store, &mut indexes, original);
        }

        txn.state = TxnState::Committed;
        self.clear_active(&txn.id);
        drop(indexes);
        drop(store);

        // Invalidate on commit, never before.
        self.cache.invalidate_many(txn.touched_paths());
        self.metrics.inc_commits();

        let keys = txn.touched_keys();
        for event in txn.pending_events.drain(..) {
            self.events.publish(&event);
        }
        self.events.publish(&EngineEvent::WriteCommitted {
            transaction_id: txn.id.clone(),
            keys: keys.clone(),
        });

        Ok(TxnOutcome {
            transaction_id: txn.id.clone(),
            results: std::mem::take(&mut txn.results),
            keys,
        })
    }

    /// Abort a staged-only transaction.
    pub fn rollback(&self, txn: &mut Transaction) -> EngineResult<()> {
        if txn.state != TxnState::Active {
            return Err(TxnError::NoActiveTransaction.into());
        }
        txn.state = TxnState::RolledBack;
        self.clear_active(&txn.id);
        // Nothing was applied; conservative invalidation only.
        self.cache.invalidate_many(txn.touched_paths());
        self.metrics.inc_rollbacks();
        Ok(())
    }

    fn run_rollback(
        &self,
        txn: &mut Transaction,
        store: &mut TaskStore,
        indexes: &mut IndexSet,
        original: EngineError,
    ) -> EngineResult<TxnOutcome> {
        txn.state = TxnState::RollingBack;
        self.metrics.inc_rollbacks();
        self.events.publish(&EngineEvent::RollbackStarted {
            transaction_id: txn.id.clone(),
        });

        let outcome = self.rollback.compensate(store, indexes, txn);
        txn.state = if outcome.compensated && outcome.validated.unwrap_or(true) {
            TxnState::RolledBack
        } else {
            TxnState::Failed
        };
        self.clear_active(&txn.id);

        self.cache.invalidate_many(txn.touched_paths());
        self.events.publish(&EngineEvent::RollbackCompleted {
            transaction_id: txn.id.clone(),
            validated: outcome.validated.unwrap_or(false),
        });

        if txn.state == TxnState::Failed {
            self.metrics.inc_rollback_failures();
            return Err(TxnError::RollbackFailed {
                original: original.to_string(),
                failure: "compensation did not restore pre-transaction state".to_string(),
            }
            .into());
        }
        // The caller observes the original error, not the rollback.
        Err(original)
    }

    fn clear_active(&self, id: &str) {
        let mut active = self.active.lock().expect("txn registry lock poisoned");
        if active.as_deref() == Some(id) {
            *active = None;
        }
    }
}

/// Capture the pre-image of a task path on first touch.
fn capture_task_pre_state(
    indexes: &IndexSet,
    store: &TaskStore,
    txn: &mut Transaction,
    path: &str,
) {
    txn.pre_records
        .entry(task_key(path))
        .or_insert_with(|| store.get(&task_key(path)).map(|r| r.body.clone()));
    if txn.pre_tasks.contains_key(path) {
        return;
    }
    let task = indexes.primary.get_by_path(path);
    let parent_id = task.as_ref().and_then(|t| indexes.parent_task_id(t));
    let mut edges: Vec<DependencyEdge> = indexes
        .dependency
        .edges_from(path)
        .into_iter()
        .cloned()
        .collect();
    for source in indexes.dependency.dependents_of(path) {
        edges.extend(
            indexes
                .dependency
                .edges_from(&source)
                .into_iter()
                .filter(|e| e.target == path)
                .cloned(),
        );
    }
    txn.pre_tasks.insert(
        path.to_string(),
        TaskPreState {
            task,
            edges,
            parent_id,
        },
    );
}

/// Apply one op to the secondary indexes (status, hierarchy,
/// dependency).
fn apply_secondary(indexes: &mut IndexSet, op: &TxOp) -> EngineResult<()> {
    match op {
        TxOp::UpsertTask(task) => {
            let parent_id = indexes.parent_task_id(task);
            indexes.hierarchy.insert(task, parent_id.as_deref())?;
            // Status was guarded upstream; cascade steps may bypass the
            // raw table so the authoritative image is written directly.
            indexes.status.insert(&task.id, task.status);
            indexes
                .dependency
                .sync_outgoing(task.path.as_str(), &task.dependencies);
            Ok(())
        }
        TxOp::DeleteTask { id, path } => {
            indexes.hierarchy.delete(id)?;
            indexes.status.delete(id)?;
            indexes.dependency.remove_all_for(path);
            Ok(())
        }
        TxOp::AddEdge(edge) => {
            indexes.dependency.add(edge.clone())?;
            Ok(())
        }
        TxOp::RemoveEdge { source, target } => {
            indexes.dependency.remove(source, target)?;
            Ok(())
        }
        TxOp::PutRecord { .. } | TxOp::DeleteRecord { .. } => Ok(()),
    }
}

/// Apply one op to the primary index.
fn apply_primary(indexes: &mut IndexSet, op: &TxOp) -> EngineResult<()> {
    match op {
        TxOp::UpsertTask(task) => {
            indexes.primary.upsert(Arc::clone(task))?;
            Ok(())
        }
        TxOp::DeleteTask { id, .. } => {
            indexes.primary.delete(id)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, TransactionConfig};
    use crate::model::{TaskKind, TaskPath};
    use tempfile::TempDir;

    fn coordinator() -> (TransactionCoordinator, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RwLock::new(TaskStore::open(dir.path()).unwrap()));
        let indexes = Arc::new(RwLock::new(IndexSet::new(7, 100)));
        let cache = Arc::new(TaskCache::new(CacheConfig::default()));
        let events = Arc::new(EventBus::new(16));
        let metrics = Arc::new(MetricsRegistry::new());
        let rollback = RollbackManager::new(TransactionConfig {
            retry_base_delay_ms: 1,
            ..TransactionConfig::default()
        });
        (
            TransactionCoordinator::new(store, indexes, cache, events, metrics, rollback),
            dir,
        )
    }

    fn task(path: &str) -> Arc<Task> {
        Arc::new(Task::new(
            TaskPath::parse(path).unwrap(),
            TaskKind::Task,
            path,
        ))
    }

    #[test]
    fn commit_applies_store_and_all_indexes() {
        let (coord, _dir) = coordinator();
        let mut txn = coord.begin(AtomicityMode::Atomic).unwrap();
        let t = task("proj/a");
        coord.execute(&mut txn, TxOp::UpsertTask(Arc::clone(&t))).unwrap();
        let outcome = coord.commit(&mut txn).unwrap();

        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].success);

        let indexes = coord.indexes().read().unwrap();
        assert!(indexes.primary.contains_path("proj/a"));
        assert!(indexes.membership_consistent());
        let store = coord.store().read().unwrap();
        assert!(store.contains("task:proj/a"));
    }

    #[test]
    fn second_begin_while_active_rejected() {
        let (coord, _dir) = coordinator();
        let _txn = coord.begin(AtomicityMode::Atomic).unwrap();
        let err = coord.begin(AtomicityMode::Atomic).unwrap_err();
        assert_eq!(err.code.as_str(), "TRANSACTION_ALREADY_ACTIVE");
    }

    #[test]
    fn commit_after_rollback_rejected() {
        let (coord, _dir) = coordinator();
        let mut txn = coord.begin(AtomicityMode::Atomic).unwrap();
        coord.rollback(&mut txn).unwrap();
        let err = coord.commit(&mut txn).unwrap_err();
        assert_eq!(err.code.as_str(), "NO_ACTIVE_TRANSACTION");
    }

    #[test]
    fn failed_index_apply_restores_everything() {
        let (coord, _dir) = coordinator();

        // Seed one committed task.
        let mut setup = coord.begin(AtomicityMode::Atomic).unwrap();
        let existing = task("proj/a");
        coord
            .execute(&mut setup, TxOp::UpsertTask(Arc::clone(&existing)))
            .unwrap();
        coord.commit(&mut setup).unwrap();

        // A task whose id collides with the existing one at another
        // path: secondaries accept it, the primary rejects the rebind.
        let mut evil = (*task("proj/b")).clone();
        evil.id = existing.id.clone();

        let mut txn = coord.begin(AtomicityMode::Atomic).unwrap();
        coord
            .execute(&mut txn, TxOp::UpsertTask(Arc::new(evil)))
            .unwrap();
        let err = coord.commit(&mut txn).unwrap_err();

        // Caller sees the original error, state is rolled back.
        assert_eq!(err.code.as_str(), "DUPLICATE");
        assert_eq!(txn.state(), TxnState::RolledBack);

        let indexes = coord.indexes().read().unwrap();
        assert!(!indexes.primary.contains_path("proj/b"));
        assert!(indexes.primary.contains_path("proj/a"));
        assert!(indexes.membership_consistent());
        let store = coord.store().read().unwrap();
        assert!(!store.contains("task:proj/b"));
    }

    #[test]
    fn best_effort_skips_secondary_indexes() {
        let (coord, _dir) = coordinator();
        let mut txn = coord.begin(AtomicityMode::BestEffort).unwrap();
        coord
            .execute(&mut txn, TxOp::UpsertTask(task("proj/a")))
            .unwrap();
        coord.commit(&mut txn).unwrap();

        let indexes = coord.indexes().read().unwrap();
        assert!(indexes.primary.contains_path("proj/a"));
        assert_eq!(indexes.status.len(), 0);
        assert_eq!(indexes.hierarchy.len(), 0);
    }

    #[test]
    fn commit_publishes_write_event_after_durability() {
        let (coord, _dir) = coordinator();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            coord
                .events()
                .subscribe(move |event| {
                    if let EngineEvent::WriteCommitted { keys, .. } = event {
                        seen.lock().unwrap().extend(keys.clone());
                    }
                })
                .unwrap();
        }
        let mut txn = coord.begin(AtomicityMode::Atomic).unwrap();
        coord
            .execute(&mut txn, TxOp::UpsertTask(task("proj/a")))
            .unwrap();
        coord.commit(&mut txn).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["task:proj/a"]);
    }
}
