//! Status index
//!
//! Secondary index from status to the set of task ids. Status updates
//! are checked against the transition table; a disallowed edge yields
//! INVALID_VALUE and mutates nothing.

use std::collections::{BTreeSet, HashMap};

use crate::model::TaskStatus;
use crate::status::transition_allowed;

use super::errors::{IndexError, IndexErrorCode, IndexResult};
use super::IndexStats;

/// Status → id set, plus the reverse binding.
#[derive(Debug, Default)]
pub struct StatusIndex {
    by_status: HashMap<TaskStatus, BTreeSet<String>>,
    current: HashMap<String, TaskStatus>,
}

impl StatusIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task at its current status, without a transition check.
    /// Used on create and rebuild; the task was validated upstream.
    pub fn insert(&mut self, id: &str, status: TaskStatus) {
        if let Some(previous) = self.current.insert(id.to_string(), status) {
            if let Some(set) = self.by_status.get_mut(&previous) {
                set.remove(id);
            }
        }
        self.by_status.entry(status).or_default().insert(id.to_string());
    }

    /// Move a task between statuses, enforcing the transition table.
    ///
    /// # Errors
    ///
    /// `INVALID_VALUE` when the edge is not in the table or the task's
    /// recorded status disagrees with `from`. Nothing is mutated on
    /// rejection.
    pub fn update(&mut self, id: &str, from: TaskStatus, to: TaskStatus) -> IndexResult<()> {
        let recorded = self.current.get(id).copied().ok_or_else(|| {
            IndexError::new(IndexErrorCode::NotFound, "status", id, "unknown task id")
        })?;
        if recorded != from {
            return Err(IndexError::new(
                IndexErrorCode::InvalidValue,
                "status",
                id,
                format!(
                    "recorded status {} does not match claimed {}",
                    recorded.as_str(),
                    from.as_str()
                ),
            ));
        }
        if !transition_allowed(from, to) {
            return Err(IndexError::new(
                IndexErrorCode::InvalidValue,
                "status",
                id,
                format!("transition {} -> {} disallowed", from.as_str(), to.as_str()),
            ));
        }
        self.insert(id, to);
        Ok(())
    }

    /// Remove a task.
    pub fn delete(&mut self, id: &str) -> IndexResult<()> {
        let status = self.current.remove(id).ok_or_else(|| {
            IndexError::new(IndexErrorCode::NotFound, "status", id, "unknown task id")
        })?;
        if let Some(set) = self.by_status.get_mut(&status) {
            set.remove(id);
        }
        Ok(())
    }

    /// The recorded status of a task.
    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.current.get(id).copied()
    }

    /// Ids at a status, in id order.
    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<String> {
        self.by_status
            .get(&status)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Count at a status.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).map(|s| s.len()).unwrap_or(0)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.by_status.clear();
        self.current.clear();
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Index counters.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.current.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn update_moves_between_sets() {
        let mut index = StatusIndex::new();
        index.insert("t1", Pending);
        index.update("t1", Pending, InProgress).unwrap();
        assert_eq!(index.status_of("t1"), Some(InProgress));
        assert_eq!(index.count(Pending), 0);
        assert_eq!(index.count(InProgress), 1);
    }

    #[test]
    fn disallowed_transition_mutates_nothing() {
        let mut index = StatusIndex::new();
        index.insert("t1", Pending);
        let err = index.update("t1", Pending, Completed).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::InvalidValue);
        assert_eq!(index.status_of("t1"), Some(Pending));
        assert_eq!(index.count(Pending), 1);
    }

    #[test]
    fn stale_from_claim_rejected() {
        let mut index = StatusIndex::new();
        index.insert("t1", InProgress);
        let err = index.update("t1", Pending, InProgress).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::InvalidValue);
    }

    #[test]
    fn ids_with_status_is_sorted() {
        let mut index = StatusIndex::new();
        index.insert("t2", Pending);
        index.insert("t1", Pending);
        index.insert("t3", Blocked);
        assert_eq!(index.ids_with_status(Pending), vec!["t1", "t2"]);
    }
}
