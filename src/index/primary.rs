//! Primary index
//!
//! Task lookup by path and by id. The path map is the canonical ordered
//! structure; prefix scans return children lazily in lexicographic
//! order. Uniqueness of both keys is enforced on insert.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::model::Task;

use super::errors::{IndexError, IndexErrorCode, IndexResult};
use super::IndexStats;

/// Path- and id-keyed task index.
#[derive(Debug, Default)]
pub struct PrimaryIndex {
    by_path: BTreeMap<String, Arc<Task>>,
    /// id → path
    by_id: HashMap<String, String>,
}

impl PrimaryIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task.
    ///
    /// # Errors
    ///
    /// `DUPLICATE` when the id is already bound to a different path.
    pub fn upsert(&mut self, task: Arc<Task>) -> IndexResult<()> {
        if let Some(existing_path) = self.by_id.get(&task.id) {
            if existing_path != task.path.as_str() {
                return Err(IndexError::new(
                    IndexErrorCode::Duplicate,
                    "primary",
                    task.id.clone(),
                    format!(
                        "id already bound to {}, refusing rebind to {}",
                        existing_path, task.path
                    ),
                ));
            }
        }
        self.by_id
            .insert(task.id.clone(), task.path.as_str().to_string());
        self.by_path.insert(task.path.as_str().to_string(), task);
        Ok(())
    }

    /// Remove a task by id.
    pub fn delete(&mut self, id: &str) -> IndexResult<Arc<Task>> {
        let path = self.by_id.remove(id).ok_or_else(|| {
            IndexError::new(IndexErrorCode::NotFound, "primary", id, "unknown task id")
        })?;
        self.by_path.remove(&path).ok_or_else(|| {
            IndexError::new(
                IndexErrorCode::NotFound,
                "primary",
                path.clone(),
                "id map pointed at a missing path entry",
            )
        })
    }

    /// Lookup by path.
    pub fn get_by_path(&self, path: &str) -> Option<Arc<Task>> {
        self.by_path.get(path).cloned()
    }

    /// Lookup by id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<Task>> {
        self.by_id
            .get(id)
            .and_then(|path| self.by_path.get(path))
            .cloned()
    }

    /// Whether a path exists.
    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Tasks under a path prefix, lexicographic, excluding the prefix
    /// task itself.
    pub fn descendants(&self, path: &str) -> impl Iterator<Item = &Arc<Task>> {
        let prefix = format!("{}/", path);
        self.by_path
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| v)
    }

    /// Immediate children of a path, lexicographic.
    pub fn children(&self, path: &str) -> Vec<Arc<Task>> {
        let depth = path.split('/').count() + 1;
        self.descendants(path)
            .filter(|t| t.path.depth() == depth)
            .cloned()
            .collect()
    }

    /// All tasks in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.by_path.values()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_id.clear();
    }

    /// Index counters.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.by_path.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskKind, TaskPath};

    fn task(path: &str) -> Arc<Task> {
        Arc::new(Task::new(
            TaskPath::parse(path).unwrap(),
            TaskKind::Task,
            path,
        ))
    }

    #[test]
    fn upsert_and_lookup_both_keys() {
        let mut index = PrimaryIndex::new();
        let t = task("proj/a");
        index.upsert(Arc::clone(&t)).unwrap();
        assert_eq!(index.get_by_path("proj/a").unwrap().id, t.id);
        assert_eq!(index.get_by_id(&t.id).unwrap().path.as_str(), "proj/a");
    }

    #[test]
    fn id_rebind_to_new_path_rejected() {
        let mut index = PrimaryIndex::new();
        let t = task("proj/a");
        index.upsert(Arc::clone(&t)).unwrap();
        let mut moved = (*t).clone();
        moved.path = TaskPath::parse("proj/b").unwrap();
        let err = index.upsert(Arc::new(moved)).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::Duplicate);
    }

    #[test]
    fn children_are_immediate_and_ordered() {
        let mut index = PrimaryIndex::new();
        for p in ["proj", "proj/b", "proj/a", "proj/a/nested"] {
            let mut t = (*task(p)).clone();
            if p == "proj" || p == "proj/a" {
                t.kind = TaskKind::Milestone;
            }
            index.upsert(Arc::new(t)).unwrap();
        }
        let children: Vec<String> = index
            .children("proj")
            .iter()
            .map(|t| t.path.as_str().to_string())
            .collect();
        assert_eq!(children, vec!["proj/a", "proj/b"]);
    }

    #[test]
    fn delete_removes_both_keys() {
        let mut index = PrimaryIndex::new();
        let t = task("proj/a");
        let id = t.id.clone();
        index.upsert(t).unwrap();
        index.delete(&id).unwrap();
        assert!(index.get_by_path("proj/a").is_none());
        assert!(index.get_by_id(&id).is_none());
        assert!(index.delete(&id).is_err());
    }
}
