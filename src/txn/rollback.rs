//! Rollback manager
//!
//! Compensates partial index application by restoring the captured
//! pre-transaction image: primary index first, then the secondary
//! indexes (in parallel when configured), then the durable store via an
//! inverse batch. Transient store failures are retried with exponential
//! backoff. An optional validation pass re-reads every touched key and
//! compares it with the capture.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::TransactionConfig;
use crate::index::IndexSet;
use crate::model::{DependencyEdge, Task};
use crate::store::{StoreBatch, TaskStore};

use super::coordinator::Transaction;

/// What a compensation run achieved.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    /// All compensation steps were applied
    pub compensated: bool,
    /// Post-rollback validation result, when enabled
    pub validated: Option<bool>,
    /// Store revert attempts used
    pub attempts: u32,
}

/// The manager.
pub struct RollbackManager {
    config: TransactionConfig,
}

impl RollbackManager {
    /// Manager with its retry policy.
    pub fn new(config: TransactionConfig) -> Self {
        Self { config }
    }

    /// Restore the pre-transaction image.
    pub fn compensate(
        &self,
        store: &mut TaskStore,
        indexes: &mut IndexSet,
        txn: &Transaction,
    ) -> RollbackOutcome {
        // Ids the failed transaction may have planted per path.
        let mut planted: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in txn.pre_tasks.keys() {
            planted.entry(path.clone()).or_default();
        }
        for op in op_ids(txn) {
            planted.entry(op.0).or_default().push(op.1);
        }

        // Phase 1: primary, first. Clear every touched path, then
        // reinstate pre-images so id bindings cannot collide mid-restore.
        for path in txn.pre_tasks.keys() {
            if let Some(current) = indexes.primary.get_by_path(path) {
                let _ = indexes.primary.delete(&current.id);
            }
        }
        for pre in txn.pre_tasks.values() {
            if let Some(task) = &pre.task {
                let _ = indexes.primary.upsert(Arc::clone(task));
            }
        }

        // Phase 2: secondaries. Build data-only plans so the three
        // restores can run on scoped threads when parallel rollback is
        // configured.
        let mut status_plan: Vec<(String, Option<Arc<Task>>)> = Vec::new();
        let mut hierarchy_plan: Vec<(Option<Arc<Task>>, Option<String>, Vec<String>)> = Vec::new();
        let mut touched_paths: Vec<String> = Vec::new();
        let mut edges: Vec<DependencyEdge> = Vec::new();
        let mut seen_edges: HashSet<(String, String)> = HashSet::new();

        let mut ordered: Vec<(&String, &super::coordinator::TaskPreState)> =
            txn.pre_tasks.iter().collect();
        ordered.sort_by_key(|(path, _)| path.split('/').count());
        for (path, pre) in ordered {
            let ids = planted.get(path).cloned().unwrap_or_default();
            status_plan.push((path.clone(), pre.task.clone()));
            hierarchy_plan.push((pre.task.clone(), pre.parent_id.clone(), ids));
            touched_paths.push(path.clone());
            for edge in &pre.edges {
                if seen_edges.insert((edge.source.clone(), edge.target.clone())) {
                    edges.push(edge.clone());
                }
            }
        }
        let planted_ids: Vec<String> = planted.values().flatten().cloned().collect();

        let IndexSet {
            primary: _,
            status,
            hierarchy,
            dependency,
        } = &mut *indexes;

        if self.config.parallel_rollback {
            thread::scope(|scope| {
                scope.spawn(|| restore_status(status, &status_plan, &planted_ids));
                scope.spawn(|| restore_hierarchy(hierarchy, &hierarchy_plan));
                scope.spawn(|| restore_dependencies(dependency, &touched_paths, &edges));
            });
        } else {
            restore_status(status, &status_plan, &planted_ids);
            restore_hierarchy(hierarchy, &hierarchy_plan);
            restore_dependencies(dependency, &touched_paths, &edges);
        }

        // Phase 3: durable store, via the inverse batch, with retries.
        let mut attempts = 0u32;
        let mut compensated = false;
        while attempts <= self.config.retry_attempts {
            let mut inverse = StoreBatch::new();
            for (key, pre) in &txn.pre_records {
                match pre {
                    Some(body) => inverse.put(key.clone(), body.clone()),
                    None => inverse.delete(key.clone()),
                };
            }
            match store.apply(inverse) {
                Ok(()) => {
                    compensated = true;
                    break;
                }
                Err(_) if attempts < self.config.retry_attempts => {
                    let delay = self.config.retry_base_delay_ms.saturating_mul(1 << attempts);
                    thread::sleep(Duration::from_millis(delay));
                }
                Err(_) => break,
            }
            attempts += 1;
        }

        let validated = if self.config.validate_after_rollback {
            Some(compensated && validate(store, indexes, txn))
        } else {
            None
        };

        RollbackOutcome {
            compensated,
            validated,
            attempts,
        }
    }
}

/// (path, id) pairs the transaction's ops would have planted.
fn op_ids(txn: &Transaction) -> Vec<(String, String)> {
    use super::coordinator::TxOp;
    txn.ops_for_compensation()
        .iter()
        .filter_map(|op| match op {
            TxOp::UpsertTask(task) => {
                Some((task.path.as_str().to_string(), task.id.clone()))
            }
            TxOp::DeleteTask { id, path } => Some((path.clone(), id.clone())),
            _ => None,
        })
        .collect()
}

fn restore_status(
    status: &mut crate::index::StatusIndex,
    plan: &[(String, Option<Arc<Task>>)],
    planted_ids: &[String],
) {
    for id in planted_ids {
        let _ = status.delete(id);
    }
    for (_, pre) in plan {
        if let Some(task) = pre {
            status.insert(&task.id, task.status);
        }
    }
}

fn restore_hierarchy(
    hierarchy: &mut crate::index::HierarchyIndex,
    plan: &[(Option<Arc<Task>>, Option<String>, Vec<String>)],
) {
    // Drop planted entries first so re-inserts never hit the children
    // bound with stale data.
    for (pre, _, planted) in plan {
        for id in planted {
            if pre.as_ref().map(|t| &t.id) != Some(id) {
                let _ = hierarchy.delete(id);
            }
        }
    }
    for (pre, parent_id, _) in plan {
        if let Some(task) = pre {
            let _ = hierarchy.insert(task, parent_id.as_deref());
        }
    }
}

fn restore_dependencies(
    dependency: &mut crate::index::DependencyIndex,
    touched_paths: &[String],
    edges: &[DependencyEdge],
) {
    for path in touched_paths {
        dependency.remove_all_for(path);
    }
    for edge in edges {
        let _ = dependency.add(edge.clone());
    }
}

/// Compare the live image with the capture for every touched key.
fn validate(store: &TaskStore, indexes: &IndexSet, txn: &Transaction) -> bool {
    for (key, pre) in &txn.pre_records {
        let live = store.get(key).map(|r| &r.body);
        if live != pre.as_ref() {
            return false;
        }
    }
    for (path, pre) in &txn.pre_tasks {
        let live = indexes.primary.get_by_path(path);
        match (&live, &pre.task) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                if a.id != b.id || a.version != b.version || a.status != b.status {
                    return false;
                }
                if indexes.status.status_of(&a.id) != Some(b.status) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_is_exponential() {
        // base * 2^attempt: 1, 2, 4 for base 1
        let base: u64 = 1;
        assert_eq!(base.saturating_mul(1 << 0), 1);
        assert_eq!(base.saturating_mul(1 << 1), 2);
        assert_eq!(base.saturating_mul(1 << 2), 4);
    }
}
