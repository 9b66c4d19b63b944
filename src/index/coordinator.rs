//! Index coordinator
//!
//! Owns all four indexes, routes query filters to the best one, rebuilds
//! the set from the durable store, and repairs cross-index membership.
//!
//! Routing: a status filter goes to the status index, a kind filter to
//! the hierarchy index, everything else to the primary. No union across
//! indexes is attempted; callers issue multiple queries instead.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Task, TaskKind, TaskStatus};
use crate::store::TaskStore;

use super::dependency::DependencyIndex;
use super::errors::{IndexError, IndexErrorCode, IndexResult};
use super::hierarchy::HierarchyIndex;
use super::primary::PrimaryIndex;
use super::status::StatusIndex;

/// Filter over tasks. All present predicates must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub kind: Option<TaskKind>,
    /// Match tasks strictly under this path
    pub path_prefix: Option<String>,
    /// Match immediate children of this path
    pub parent: Option<String>,
    /// Substring or `*`/`?` glob over name and description
    pub text: Option<String>,
}

/// Sortable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Path,
    Name,
    Created,
    Updated,
}

/// Sort specification.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Path,
            descending: false,
        }
    }
}

/// Result paging.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// What a repair pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub status_orphans_removed: u64,
    pub hierarchy_orphans_removed: u64,
    pub dependency_orphans_removed: u64,
    pub children_relinked: u64,
}

impl RepairReport {
    /// Whether anything was repaired.
    pub fn changed(&self) -> bool {
        *self != RepairReport::default()
    }
}

/// The four indexes behind one coordinator.
#[derive(Debug)]
pub struct IndexSet {
    pub primary: PrimaryIndex,
    pub status: StatusIndex,
    pub hierarchy: HierarchyIndex,
    pub dependency: DependencyIndex,
}

impl IndexSet {
    /// Empty set with hierarchy bounds.
    pub fn new(max_depth: usize, max_children: usize) -> Self {
        Self {
            primary: PrimaryIndex::new(),
            status: StatusIndex::new(),
            hierarchy: HierarchyIndex::new(max_depth, max_children),
            dependency: DependencyIndex::new(),
        }
    }

    /// Resolve the in-tree parent id for a task: the task indexed at the
    /// parent path, or None when the parent is a project root (or absent).
    pub fn parent_task_id(&self, task: &Task) -> Option<String> {
        task.parent_path
            .as_ref()
            .and_then(|p| self.primary.get_by_path(p.as_str()))
            .map(|parent| parent.id.clone())
    }

    /// Insert a task into every index. Used by rebuild and create; the
    /// transaction coordinator applies per-index steps itself when it
    /// needs compensating control.
    pub fn insert_task(&mut self, task: Arc<Task>) -> IndexResult<()> {
        let parent_id = self.parent_task_id(&task);
        self.hierarchy.insert(&task, parent_id.as_deref())?;
        self.status.insert(&task.id, task.status);
        self.dependency
            .sync_outgoing(task.path.as_str(), &task.dependencies);
        self.primary.upsert(task)?;
        Ok(())
    }

    /// Remove a task from every index.
    pub fn remove_task(&mut self, id: &str) -> IndexResult<Arc<Task>> {
        let task = self.primary.get_by_id(id).ok_or_else(|| {
            IndexError::new(IndexErrorCode::NotFound, "primary", id, "unknown task id")
        })?;
        self.dependency.remove_all_for(task.path.as_str());
        self.hierarchy.delete(id)?;
        self.status.delete(id)?;
        self.primary.delete(id)?;
        Ok(task)
    }

    /// Route a filter and execute it.
    pub fn query(&self, filter: &TaskFilter, sort: SortSpec, paging: Paging) -> Vec<Arc<Task>> {
        let mut candidates: Vec<Arc<Task>> = if let Some(status) = filter.status {
            self.status
                .ids_with_status(status)
                .iter()
                .filter_map(|id| self.primary.get_by_id(id))
                .collect()
        } else if let Some(kind) = filter.kind {
            self.hierarchy
                .ids_with_kind(kind)
                .iter()
                .filter_map(|id| self.primary.get_by_id(id))
                .collect()
        } else if let Some(parent) = &filter.parent {
            self.primary.children(parent)
        } else if let Some(prefix) = &filter.path_prefix {
            self.primary.descendants(prefix).cloned().collect()
        } else {
            self.primary.iter().cloned().collect()
        };

        candidates.retain(|task| matches(task, filter));
        sort_tasks(&mut candidates, sort);
        candidates
            .into_iter()
            .skip(paging.offset)
            .take(paging.limit)
            .collect()
    }

    /// Rebuild every index from the durable store.
    ///
    /// Tasks are inserted parents-first so hierarchy linking always finds
    /// the parent entry.
    pub fn rebuild(&mut self, store: &TaskStore) -> IndexResult<u64> {
        self.clear();
        let mut tasks: Vec<Task> = Vec::new();
        for record in store.range("task:") {
            let task: Task = serde_json::from_value(record.body.clone()).map_err(|e| {
                IndexError::new(
                    IndexErrorCode::InvalidValue,
                    "primary",
                    record.key.clone(),
                    format!("stored task failed to deserialize: {}", e),
                )
            })?;
            tasks.push(task);
        }
        tasks.sort_by_key(|t| (t.path.depth(), t.path.as_str().to_string()));
        let count = tasks.len() as u64;
        for task in tasks {
            self.insert_task(Arc::new(task))?;
        }
        Ok(count)
    }

    /// Drop orphan entries and re-derive children lists.
    pub fn repair(&mut self) -> RepairReport {
        let mut report = RepairReport::default();

        let live_ids: std::collections::HashSet<String> =
            self.primary.iter().map(|t| t.id.clone()).collect();
        let live_paths: std::collections::HashSet<String> = self
            .primary
            .iter()
            .map(|t| t.path.as_str().to_string())
            .collect();

        for status in TaskStatus::ALL {
            for id in self.status.ids_with_status(status) {
                if !live_ids.contains(&id) {
                    let _ = self.status.delete(&id);
                    report.status_orphans_removed += 1;
                }
            }
        }

        // Rebuild hierarchy from the primary image: drops orphans and
        // relinks children lists in one deterministic pass.
        let before = self.hierarchy.len() as u64;
        let mut tasks: Vec<Arc<Task>> = self.primary.iter().cloned().collect();
        tasks.sort_by_key(|t| (t.path.depth(), t.path.as_str().to_string()));
        self.hierarchy.clear();
        for task in &tasks {
            let parent_id = self.parent_task_id(task);
            if self.hierarchy.insert(task, parent_id.as_deref()).is_ok() {
                report.children_relinked += 1;
            }
        }
        report.hierarchy_orphans_removed = before.saturating_sub(tasks.len() as u64);

        for source in self.dependency.sources() {
            if !live_paths.contains(&source) {
                report.dependency_orphans_removed +=
                    self.dependency.remove_all_for(&source).len() as u64;
                continue;
            }
            for target in self.dependency.targets_of(&source) {
                if !live_paths.contains(&target) {
                    let _ = self.dependency.remove(&source, &target);
                    report.dependency_orphans_removed += 1;
                }
            }
        }

        report
    }

    /// Drop all entries from every index.
    pub fn clear(&mut self) {
        self.primary.clear();
        self.status.clear();
        self.hierarchy.clear();
        self.dependency.clear();
    }

    /// Cross-index membership check: every primary task appears in the
    /// status and hierarchy indexes and nowhere else. Used by tests and
    /// the maintenance probe.
    pub fn membership_consistent(&self) -> bool {
        if self.primary.len() != self.status.len() || self.primary.len() != self.hierarchy.len() {
            return false;
        }
        for task in self.primary.iter() {
            match self.status.status_of(&task.id) {
                Some(status) if status == task.status => {}
                _ => return false,
            }
            if self.hierarchy.get(&task.id).is_none() {
                return false;
            }
        }
        true
    }
}

fn matches(task: &Task, filter: &TaskFilter) -> bool {
    if let Some(status) = filter.status {
        if task.status != status {
            return false;
        }
    }
    if let Some(kind) = filter.kind {
        if task.kind != kind {
            return false;
        }
    }
    if let Some(prefix) = &filter.path_prefix {
        let boundary = format!("{}/", prefix);
        if !task.path.as_str().starts_with(&boundary) {
            return false;
        }
    }
    if let Some(parent) = &filter.parent {
        match &task.parent_path {
            Some(p) if p.as_str() == parent.as_str() => {}
            _ => return false,
        }
    }
    if let Some(text) = &filter.text {
        if !text_matches(text, &task.name) && !text_matches(text, &task.description) {
            return false;
        }
    }
    true
}

/// Substring match, or an anchored glob when the pattern carries `*`/`?`.
fn text_matches(pattern: &str, haystack: &str) -> bool {
    if pattern.contains('*') || pattern.contains('?') {
        glob_regex(pattern)
            .map(|re| re.is_match(haystack))
            .unwrap_or(false)
    } else {
        haystack.to_lowercase().contains(&pattern.to_lowercase())
    }
}

fn glob_regex(pattern: &str) -> Option<Regex> {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<String, Regex>>> =
        OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()));
    let mut cache = cache.lock().ok()?;
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    let re = Regex::new(&format!("(?i)^{}$", escaped)).ok()?;
    cache.insert(pattern.to_string(), re.clone());
    Some(re)
}

fn sort_tasks(tasks: &mut [Arc<Task>], sort: SortSpec) {
    match sort.field {
        SortField::Path => tasks.sort_by(|a, b| a.path.as_str().cmp(b.path.as_str())),
        SortField::Name => tasks.sort_by(|a, b| a.name.cmp(&b.name)),
        SortField::Created => tasks.sort_by(|a, b| a.created.cmp(&b.created)),
        SortField::Updated => tasks.sort_by(|a, b| a.updated.cmp(&b.updated)),
    }
    if sort.descending {
        tasks.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskPath;

    fn insert(set: &mut IndexSet, path: &str, kind: TaskKind, status: TaskStatus) -> Arc<Task> {
        let mut task = Task::new(TaskPath::parse(path).unwrap(), kind, path);
        task.status = status;
        let task = Arc::new(task);
        set.insert_task(Arc::clone(&task)).unwrap();
        task
    }

    fn seeded() -> IndexSet {
        let mut set = IndexSet::new(7, 100);
        insert(&mut set, "proj/m", TaskKind::Milestone, TaskStatus::Pending);
        insert(&mut set, "proj/m/a", TaskKind::Task, TaskStatus::InProgress);
        insert(&mut set, "proj/m/b", TaskKind::Task, TaskStatus::Pending);
        set
    }

    #[test]
    fn status_filter_routes_to_status_index() {
        let set = seeded();
        let filter = TaskFilter {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        };
        let hits = set.query(&filter, SortSpec::default(), Paging::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path.as_str(), "proj/m/a");
    }

    #[test]
    fn kind_filter_routes_to_hierarchy_index() {
        let set = seeded();
        let filter = TaskFilter {
            kind: Some(TaskKind::Milestone),
            ..Default::default()
        };
        let hits = set.query(&filter, SortSpec::default(), Paging::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path.as_str(), "proj/m");
    }

    #[test]
    fn glob_and_substring_text_filter() {
        let mut set = IndexSet::new(7, 100);
        let mut task = Task::new(
            TaskPath::parse("proj/parse").unwrap(),
            TaskKind::Task,
            "Implement parser",
        );
        task.description = "tokenizer and AST".to_string();
        set.insert_task(Arc::new(task)).unwrap();

        let hit = |text: &str| {
            let filter = TaskFilter {
                text: Some(text.to_string()),
                ..Default::default()
            };
            set.query(&filter, SortSpec::default(), Paging::default()).len()
        };
        assert_eq!(hit("parser"), 1);
        assert_eq!(hit("Implement*"), 1);
        assert_eq!(hit("*AST"), 1);
        assert_eq!(hit("?mplement parser"), 1);
        assert_eq!(hit("missing"), 0);
        assert_eq!(hit("Implement"), 1);
    }

    #[test]
    fn paging_applies_after_sort() {
        let set = seeded();
        let paging = Paging {
            offset: 1,
            limit: 1,
        };
        let hits = set.query(&TaskFilter::default(), SortSpec::default(), paging);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path.as_str(), "proj/m/a");
    }

    #[test]
    fn membership_is_consistent_after_inserts_and_removes() {
        let mut set = seeded();
        assert!(set.membership_consistent());
        let victim = set.primary.get_by_path("proj/m/b").unwrap();
        set.remove_task(&victim.id).unwrap();
        assert!(set.membership_consistent());
    }
}
