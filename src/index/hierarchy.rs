//! Hierarchy index
//!
//! Parent/children structure per task: `{task_id, parent_id, children,
//! depth, path_segments}`. Inserts and updates that would create a cycle,
//! exceed the depth bound, break containment rules, or overflow a
//! parent's children bound are rejected before anything is mutated.
//! Parent children lists are maintained in the same batch as child
//! inserts.

use std::collections::HashMap;

use crate::model::{Task, TaskKind};

use super::errors::{IndexError, IndexErrorCode, IndexResult};
use super::IndexStats;

/// One hierarchy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub task_id: String,
    pub parent_id: Option<String>,
    /// Child ids in insertion order
    pub children: Vec<String>,
    pub depth: usize,
    pub path_segments: Vec<String>,
    pub kind: TaskKind,
}

/// The hierarchy index.
#[derive(Debug)]
pub struct HierarchyIndex {
    entries: HashMap<String, HierarchyEntry>,
    max_depth: usize,
    max_children: usize,
}

impl HierarchyIndex {
    /// Empty index with bounds.
    pub fn new(max_depth: usize, max_children: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_depth,
            max_children,
        }
    }

    /// Insert a task under its parent (if any).
    ///
    /// The parent, when the task has one *within the task tree*, must
    /// already be indexed; top-level tasks (whose parent is the project
    /// root) carry no parent_id here.
    ///
    /// # Errors
    ///
    /// - `HIERARCHY_DEPTH_EXCEEDED` past the depth bound
    /// - `TYPE_ERROR` when the parent kind cannot contain the child kind
    /// - `LIMIT_EXCEEDED` when the parent is at its children bound
    /// - `CIRCULAR_DEPENDENCY` when the containment edge closes a loop
    pub fn insert(&mut self, task: &Task, parent_id: Option<&str>) -> IndexResult<()> {
        let depth = task.path.depth();
        if depth > self.max_depth {
            return Err(IndexError::new(
                IndexErrorCode::DepthExceeded,
                "hierarchy",
                task.path.as_str(),
                format!("depth {} exceeds bound {}", depth, self.max_depth),
            ));
        }

        if let Some(pid) = parent_id {
            let parent = self.entries.get(pid).ok_or_else(|| {
                IndexError::new(
                    IndexErrorCode::NotFound,
                    "hierarchy",
                    pid,
                    "parent not indexed",
                )
            })?;
            if !parent.kind.can_contain(task.kind) {
                return Err(IndexError::new(
                    IndexErrorCode::InvalidContainment,
                    "hierarchy",
                    task.path.as_str(),
                    format!(
                        "{} may not contain {}",
                        parent.kind.as_str(),
                        task.kind.as_str()
                    ),
                ));
            }
            if parent.children.len() >= self.max_children
                && !parent.children.iter().any(|c| c == &task.id)
            {
                return Err(IndexError::new(
                    IndexErrorCode::LimitExceeded,
                    "hierarchy",
                    pid,
                    format!("parent holds {} children, limit reached", parent.children.len()),
                ));
            }
            if self.would_cycle(&task.id, pid) {
                return Err(IndexError::new(
                    IndexErrorCode::CycleDetected,
                    "hierarchy",
                    task.path.as_str(),
                    "containment edge closes a loop",
                ));
            }
        }

        let entry = HierarchyEntry {
            task_id: task.id.clone(),
            parent_id: parent_id.map(|s| s.to_string()),
            children: self
                .entries
                .get(&task.id)
                .map(|e| e.children.clone())
                .unwrap_or_default(),
            depth,
            path_segments: task.path.segments().iter().map(|s| s.to_string()).collect(),
            kind: task.kind,
        };

        // Entry first, then the parent's children list; both are in the
        // caller's batch so a coordinator rollback undoes them together.
        if let Some(old) = self.entries.insert(task.id.clone(), entry) {
            if let Some(old_pid) = old.parent_id {
                if Some(old_pid.as_str()) != parent_id {
                    if let Some(old_parent) = self.entries.get_mut(&old_pid) {
                        old_parent.children.retain(|c| c != &task.id);
                    }
                }
            }
        }
        if let Some(pid) = parent_id {
            if let Some(parent) = self.entries.get_mut(pid) {
                if !parent.children.iter().any(|c| c == &task.id) {
                    parent.children.push(task.id.clone());
                }
            }
        }
        Ok(())
    }

    /// Walk up from `start_parent`; seeing `id` again means a loop.
    fn would_cycle(&self, id: &str, start_parent: &str) -> bool {
        let mut cursor = Some(start_parent.to_string());
        let mut hops = 0;
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            hops += 1;
            if hops > self.max_depth {
                return true;
            }
            cursor = self
                .entries
                .get(&current)
                .and_then(|e| e.parent_id.clone());
        }
        false
    }

    /// Remove a task, unlinking it from its parent.
    ///
    /// # Errors
    ///
    /// `INVALID_VALUE` while the task still has children; deletion
    /// cascades are resolved by the coordinator before the index sees
    /// the delete.
    pub fn delete(&mut self, id: &str) -> IndexResult<()> {
        let entry = self.entries.get(id).ok_or_else(|| {
            IndexError::new(IndexErrorCode::NotFound, "hierarchy", id, "unknown task id")
        })?;
        if !entry.children.is_empty() {
            return Err(IndexError::new(
                IndexErrorCode::InvalidValue,
                "hierarchy",
                id,
                format!("task still has {} children", entry.children.len()),
            ));
        }
        let parent_id = entry.parent_id.clone();
        self.entries.remove(id);
        if let Some(pid) = parent_id {
            if let Some(parent) = self.entries.get_mut(&pid) {
                parent.children.retain(|c| c != id);
            }
        }
        Ok(())
    }

    /// The entry for a task.
    pub fn get(&self, id: &str) -> Option<&HierarchyEntry> {
        self.entries.get(id)
    }

    /// Child ids of a task, in insertion order.
    pub fn children_of(&self, id: &str) -> Vec<String> {
        self.entries
            .get(id)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    /// Ids of tasks with a given kind.
    pub fn ids_with_kind(&self, kind: TaskKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.kind == kind)
            .map(|e| e.task_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index counters.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.entries.len() as u64,
        }
    }
}
