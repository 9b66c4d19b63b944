//! Task operations
//!
//! Create, update, delete, and the read surface. All writes validate
//! before any state mutates, then stage through the coordinator so the
//! durable store and every index commit together.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::api::request::{NoteSpec, TaskListSpec, TaskSpec, TaskUpdateSpec};
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::events::EngineEvent;
use crate::index::{Paging, SortField, SortSpec, TaskFilter};
use crate::model::{
    project_key, Note, Project, Task, TaskKind, TaskPath, TaskStatus,
};
use crate::status::{plan_transition, TransitionPlan, TransitionStep};
use crate::txn::TxOp;
use crate::validate::DependencyValidator;

use super::TaskEngine;

/// One item's failure inside a bulk operation.
#[derive(Debug, Clone)]
pub struct ItemError {
    pub index: usize,
    pub code: ErrorCode,
    pub message: String,
}

fn bulk_error(operation: &str, items: Vec<ItemError>) -> EngineError {
    let first = items.first().map(|i| i.code).unwrap_or(ErrorCode::InvalidValue);
    let message = items
        .first()
        .map(|i| i.message.clone())
        .unwrap_or_else(|| "bulk validation failed".to_string());
    EngineError::new(first, operation, message).with_details(json!({
        "item_errors": items
            .iter()
            .map(|i| json!({"index": i.index, "code": i.code.as_str(), "message": i.message}))
            .collect::<Vec<_>>(),
    }))
}

impl TaskEngine {
    /// Create tasks atomically. Items may depend on and contain each
    /// other; validation sees earlier items in the same batch.
    pub fn create_tasks(&self, specs: &[TaskSpec]) -> EngineResult<Vec<Arc<Task>>> {
        if specs.is_empty() || specs.len() > 100 {
            return Err(EngineError::new(
                ErrorCode::LimitExceeded,
                "task.create",
                format!("bulk accepts 1-100 items, got {}", specs.len()),
            ));
        }

        let limits = &self.config().limits;
        let primary_path = specs.first().map(|s| s.path.as_str());
        self.with_txn(primary_path, |txn| {
            let mut built: Vec<Arc<Task>> = Vec::new();
            let mut failures: Vec<ItemError> = Vec::new();
            {
                let indexes = self
                    .indexes()
                    .read()
                    .map_err(|_| EngineError::internal("task.create", "index lock poisoned"))?;
                let store = self
                    .store()
                    .read()
                    .map_err(|_| EngineError::internal("task.create", "store lock poisoned"))?;
                let mut batch_paths: BTreeSet<String> = BTreeSet::new();
                let mut batch_kinds: std::collections::HashMap<String, TaskKind> =
                    std::collections::HashMap::new();

                for (position, spec) in specs.iter().enumerate() {
                    match build_task(spec, limits) {
                        Ok(task) => {
                            let path = task.path.as_str().to_string();
                            if indexes.primary.contains_path(&path) || batch_paths.contains(&path)
                            {
                                failures.push(ItemError {
                                    index: position,
                                    code: ErrorCode::Duplicate,
                                    message: format!("task already exists: {}", path),
                                });
                                continue;
                            }
                            if let Err(item) = check_parent(
                                position,
                                &task,
                                &indexes,
                                &store,
                                &batch_paths,
                                &batch_kinds,
                            ) {
                                failures.push(item);
                                continue;
                            }
                            if let Err(item) =
                                check_dependencies(position, &task, &indexes, &batch_paths, limits)
                            {
                                failures.push(item);
                                continue;
                            }
                            batch_paths.insert(path.clone());
                            batch_kinds.insert(path, task.kind);
                            built.push(Arc::new(task));
                        }
                        Err(e) => failures.push(ItemError {
                            index: position,
                            code: e.code,
                            message: e.message,
                        }),
                    }
                }
            }
            if !failures.is_empty() {
                return Err(bulk_error("task.create", failures));
            }

            // Top-level tasks also join their project's task set.
            let mut project_updates: std::collections::HashMap<String, Project> =
                std::collections::HashMap::new();
            for task in &built {
                if task.path.depth() == 2 {
                    let root = task.path.root().to_string();
                    let project = match project_updates.get(&root) {
                        Some(p) => Some(p.clone()),
                        None => self.load_project(&root)?,
                    };
                    if let Some(mut project) = project {
                        project.tasks.insert(task.path.as_str().to_string());
                        project.touch();
                        project_updates.insert(root, project);
                    }
                }
                self.stage(txn, TxOp::UpsertTask(Arc::clone(task)))?;
            }
            for project in project_updates.into_values() {
                let body = serde_json::to_value(&project)
                    .map_err(|e| EngineError::internal("task.create", e.to_string()))?;
                self.stage(
                    txn,
                    TxOp::PutRecord {
                        key: project_key(project.path.as_str()),
                        body,
                    },
                )?;
            }
            Ok(built)
        })
    }

    /// Update one task: content fields, notes, dependencies, and the
    /// status state machine with its propagation group.
    ///
    /// Returns the updated task and the transition plan when a status
    /// change was requested (the plan reports auto-rewrites).
    pub fn update_task(
        &self,
        spec: &TaskUpdateSpec,
    ) -> EngineResult<(Arc<Task>, Option<TransitionPlan>)> {
        let path = TaskPath::parse(&spec.path)?;
        let limits = self.config().limits.clone();

        // The whole read-plan-stage sequence runs under the path lock,
        // so the snapshot the plan is computed from cannot go stale
        // before the commit.
        self.with_txn(Some(path.as_str()), |txn| {
            let (mut updated, plan, cascade_tasks) = {
                let indexes = self
                    .indexes()
                    .read()
                    .map_err(|_| EngineError::internal("task.update", "index lock poisoned"))?;
                let current = indexes
                    .primary
                    .get_by_path(path.as_str())
                    .ok_or_else(|| EngineError::not_found("task.update", path.as_str()))?;
                let mut updated = (*current).clone();

                if let Some(name) = &spec.name {
                    updated.name = name.clone();
                }
                if let Some(description) = &spec.description {
                    updated.description = description.clone();
                }
                if let Some(reasoning) = &spec.reasoning {
                    updated.reasoning = reasoning.clone();
                }
                if let Some(assignee) = &spec.assignee {
                    updated.status_meta.assignee = Some(assignee.clone());
                }
                if let Some(annex) = &spec.annex {
                    updated.annex = Some(annex.clone());
                }
                if let Some(note) = &spec.add_note {
                    append_note(&mut updated, note, &limits)?;
                }
                if let Some(deps) = &spec.set_dependencies {
                    updated.dependencies = deps.iter().cloned().collect();
                    let validator =
                        DependencyValidator::new(&indexes, limits.max_dependency_depth);
                    let report = validator.validate_task(&updated);
                    if !report.valid {
                        return Err(report.into_engine_error("task.update"));
                    }
                }
                updated.validate(
                    limits.max_notes_per_category,
                    limits.max_note_bytes,
                    limits.max_annex_bytes,
                )?;

                // Kind changes: container to plain is refused while
                // children exist; the opposite widening is allowed.
                if let Some(kind) = spec.kind {
                    if kind != updated.kind
                        && !kind.is_container()
                        && !indexes.primary.children(path.as_str()).is_empty()
                    {
                        return Err(EngineError::new(
                            ErrorCode::TypeError,
                            "task.update",
                            "cannot narrow a milestone with children to a plain task",
                        ));
                    }
                    updated.kind = kind;
                }

                let (plan, cascade_tasks) = match spec.status {
                    Some(requested) => {
                        let plan = plan_transition(
                            &updated,
                            requested,
                            spec.reason.clone(),
                            &indexes,
                        )?;
                        let mut cascade_tasks: Vec<Arc<Task>> = Vec::new();
                        for step in plan.steps.iter().skip(1) {
                            let dependent = indexes
                                .primary
                                .get_by_path(&step.path)
                                .ok_or_else(|| {
                                    EngineError::not_found("task.update", step.path.clone())
                                })?;
                            cascade_tasks.push(dependent);
                        }
                        (Some(plan), cascade_tasks)
                    }
                    None => (None, Vec::new()),
                };
                (updated, plan, cascade_tasks)
            };

            if let Some(plan) = &plan {
                apply_step(&mut updated, plan.primary(), spec.verification.as_deref());
            } else {
                updated.touch();
            }
            let updated = Arc::new(updated);

            let mut staged: Vec<Arc<Task>> = vec![Arc::clone(&updated)];
            if let Some(plan) = &plan {
                for (step, task) in plan.steps.iter().skip(1).zip(cascade_tasks) {
                    let mut cascaded = (*task).clone();
                    apply_step(&mut cascaded, step, None);
                    staged.push(Arc::new(cascaded));
                }
            }

            for task in &staged {
                self.stage(txn, TxOp::UpsertTask(Arc::clone(task)))?;
            }
            if let Some(plan) = &plan {
                for step in &plan.steps {
                    txn.push_event(EngineEvent::StatusChanged {
                        task_id: step.task_id.clone(),
                        path: step.path.clone(),
                        from: step.from,
                        to: step.to,
                        auto: step.auto,
                    });
                }
            }
            Ok((updated, plan))
        })
    }

    /// Delete a task, cascading to descendants and scrubbing inbound
    /// dependency references from surviving tasks.
    pub fn delete_task(&self, path: &str) -> EngineResult<u64> {
        let path = TaskPath::parse(path)?;
        // Cascade membership is computed under the path lock so no task
        // can join or leave the subtree between the read and the commit.
        self.with_txn(Some(path.as_str()), |txn| {
            let (doomed, dependents, project) = {
                let indexes = self
                    .indexes()
                    .read()
                    .map_err(|_| EngineError::internal("task.delete", "index lock poisoned"))?;
                let root = indexes
                    .primary
                    .get_by_path(path.as_str())
                    .ok_or_else(|| EngineError::not_found("task.delete", path.as_str()))?;

                // Deepest-first so hierarchy unlinking always sees empty
                // children lists.
                let mut doomed: Vec<Arc<Task>> = indexes
                    .primary
                    .descendants(path.as_str())
                    .cloned()
                    .collect();
                doomed.push(root.clone());
                doomed.sort_by_key(|t| std::cmp::Reverse(t.path.depth()));

                let doomed_paths: BTreeSet<String> = doomed
                    .iter()
                    .map(|t| t.path.as_str().to_string())
                    .collect();
                let mut dependents: Vec<Arc<Task>> = Vec::new();
                let mut seen: BTreeSet<String> = BTreeSet::new();
                for gone in &doomed_paths {
                    for source in indexes.dependency.dependents_of(gone) {
                        if doomed_paths.contains(&source) || !seen.insert(source.clone()) {
                            continue;
                        }
                        if let Some(task) = indexes.primary.get_by_path(&source) {
                            let mut scrubbed = (*task).clone();
                            scrubbed.dependencies.retain(|d| !doomed_paths.contains(d));
                            scrubbed.touch();
                            dependents.push(Arc::new(scrubbed));
                        }
                    }
                }

                let project = if path.depth() == 2 {
                    self.load_project(path.root())?.map(|mut p| {
                        p.tasks.remove(path.as_str());
                        p.touch();
                        p
                    })
                } else {
                    None
                };
                (doomed, dependents, project)
            };

            for task in &dependents {
                self.stage(txn, TxOp::UpsertTask(Arc::clone(task)))?;
            }
            for task in &doomed {
                self.stage(
                    txn,
                    TxOp::DeleteTask {
                        id: task.id.clone(),
                        path: task.path.as_str().to_string(),
                    },
                )?;
            }
            if let Some(project) = &project {
                let body = serde_json::to_value(project)
                    .map_err(|e| EngineError::internal("task.delete", e.to_string()))?;
                self.stage(
                    txn,
                    TxOp::PutRecord {
                        key: project_key(project.path.as_str()),
                        body,
                    },
                )?;
            }
            Ok(doomed.len() as u64)
        })
    }

    /// Read one task, through the cache.
    pub fn get_task(&self, path: &str) -> EngineResult<Option<Arc<Task>>> {
        if let Some(hit) = self.cache().get(path) {
            self.metrics().inc_cache_hits();
            return Ok(Some(hit));
        }
        self.metrics().inc_cache_misses();
        let indexes = self
            .indexes()
            .read()
            .map_err(|_| EngineError::internal("task.get", "index lock poisoned"))?;
        let task = indexes.primary.get_by_path(path);
        if let Some(task) = &task {
            self.cache().insert(Arc::clone(task));
        }
        Ok(task)
    }

    /// Filtered, sorted, paged task listing.
    pub fn list_tasks(&self, spec: &TaskListSpec) -> EngineResult<Vec<Arc<Task>>> {
        let indexes = self
            .indexes()
            .read()
            .map_err(|_| EngineError::internal("task.list", "index lock poisoned"))?;
        let filter = TaskFilter {
            status: spec.status,
            kind: spec.kind,
            path_prefix: spec.path_prefix.clone(),
            parent: spec.parent.clone(),
            text: spec.text.clone(),
        };
        let sort = SortSpec {
            field: match spec.sort.as_deref() {
                Some("name") => SortField::Name,
                Some("created") => SortField::Created,
                Some("updated") => SortField::Updated,
                _ => SortField::Path,
            },
            descending: spec.descending.unwrap_or(false),
        };
        let paging = Paging {
            offset: spec.offset.unwrap_or(0),
            limit: spec.limit.unwrap_or(usize::MAX),
        };
        Ok(indexes.query(&filter, sort, paging))
    }

    /// Immediate children of a path.
    pub fn get_children(&self, path: &str) -> EngineResult<Vec<Arc<Task>>> {
        let indexes = self
            .indexes()
            .read()
            .map_err(|_| EngineError::internal("task.get_children", "index lock poisoned"))?;
        Ok(indexes.primary.children(path))
    }

    /// All tasks at a status, in id order.
    pub fn get_by_status(&self, status: TaskStatus) -> EngineResult<Vec<Arc<Task>>> {
        let indexes = self
            .indexes()
            .read()
            .map_err(|_| EngineError::internal("task.get_by_status", "index lock poisoned"))?;
        Ok(indexes
            .status
            .ids_with_status(status)
            .iter()
            .filter_map(|id| indexes.primary.get_by_id(id))
            .collect())
    }

    /// Load a project record from the store.
    pub(crate) fn load_project(&self, root: &str) -> EngineResult<Option<Project>> {
        let store = self
            .store()
            .read()
            .map_err(|_| EngineError::internal("project.get", "store lock poisoned"))?;
        match store.get(&project_key(root)) {
            Some(record) => {
                let project: Project = serde_json::from_value(record.body.clone())
                    .map_err(|e| EngineError::internal("project.get", e.to_string()))?;
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }
}

fn build_task(spec: &TaskSpec, limits: &crate::config::LimitsConfig) -> Result<Task, ItemErrorParts> {
    let path = TaskPath::parse(&spec.path).map_err(|e| ItemErrorParts {
        code: ErrorCode::InvalidPath,
        message: e.to_string(),
    })?;
    if path.depth() < 2 {
        return Err(ItemErrorParts {
            code: ErrorCode::InvalidPath,
            message: format!("task path must sit under a project: {}", spec.path),
        });
    }
    let mut task = Task::new(path, spec.kind.unwrap_or(TaskKind::Task), spec.name.clone());
    if let Some(description) = &spec.description {
        task.description = description.clone();
    }
    if let Some(reasoning) = &spec.reasoning {
        task.reasoning = reasoning.clone();
    }
    task.dependencies = spec.dependencies.iter().cloned().collect();
    task.annex = spec.annex.clone();
    task.validate(
        limits.max_notes_per_category,
        limits.max_note_bytes,
        limits.max_annex_bytes,
    )
    .map_err(|e| {
        let engine: EngineError = e.into();
        ItemErrorParts {
            code: engine.code,
            message: engine.message,
        }
    })?;
    Ok(task)
}

struct ItemErrorParts {
    code: ErrorCode,
    message: String,
}

fn check_parent(
    position: usize,
    task: &Task,
    indexes: &crate::index::IndexSet,
    store: &crate::store::TaskStore,
    batch_paths: &BTreeSet<String>,
    batch_kinds: &std::collections::HashMap<String, TaskKind>,
    ) -> Result<(), ItemError> {
    let parent = match &task.parent_path {
        Some(p) => p,
        None => return Ok(()),
    };
    if parent.depth() == 1 {
        // Top-level task: the parent is the project root.
        if !store.contains(&project_key(parent.as_str())) {
            return Err(ItemError {
                index: position,
                code: ErrorCode::InvalidReference,
                message: format!("project does not exist: {}", parent.as_str()),
            });
        }
        return Ok(());
    }
    let parent_kind = indexes
        .primary
        .get_by_path(parent.as_str())
        .map(|t| t.kind)
        .or_else(|| batch_kinds.get(parent.as_str()).copied());
    match parent_kind {
        Some(kind) if kind.can_contain(task.kind) => Ok(()),
        Some(kind) => Err(ItemError {
            index: position,
            code: ErrorCode::TypeError,
            message: format!(
                "{} may not contain {}",
                kind.as_str(),
                task.kind.as_str()
            ),
        }),
        None if batch_paths.contains(parent.as_str()) => Ok(()),
        None => Err(ItemError {
            index: position,
            code: ErrorCode::InvalidReference,
            message: format!("parent does not exist: {}", parent.as_str()),
        }),
    }
}

fn check_dependencies(
    position: usize,
    task: &Task,
    indexes: &crate::index::IndexSet,
    batch_paths: &BTreeSet<String>,
    limits: &crate::config::LimitsConfig,
) -> Result<(), ItemError> {
    for target in &task.dependencies {
        if batch_paths.contains(target) {
            continue;
        }
        if !indexes.primary.contains_path(target) {
            return Err(ItemError {
                index: position,
                code: ErrorCode::InvalidReference,
                message: format!("dependency target does not exist: {}", target),
            });
        }
    }
    let validator = DependencyValidator::new(indexes, limits.max_dependency_depth);
    let report = validator.validate_task(task);
    // Targets satisfied inside the batch were already accepted above.
    let residual: Vec<_> = report
        .errors
        .iter()
        .filter(|issue| match issue {
            crate::validate::ValidationIssue::MissingTarget { target, .. } => {
                !batch_paths.contains(target)
            }
            _ => true,
        })
        .collect();
    if !residual.is_empty() {
        let first = residual[0];
        return Err(ItemError {
            index: position,
            code: first.code(),
            message: first.to_string(),
        });
    }
    Ok(())
}

fn append_note(
    task: &mut Task,
    note: &NoteSpec,
    limits: &crate::config::LimitsConfig,
) -> EngineResult<()> {
    task.notes
        .append(
            note.category,
            Note::new(note.text.clone()),
            limits.max_notes_per_category,
            limits.max_note_bytes,
        )
        .map_err(EngineError::from)
}

/// Write one transition step onto a task value.
fn apply_step(task: &mut Task, step: &TransitionStep, verification: Option<&str>) {
    task.status = step.to;
    let now = Utc::now();
    match step.to {
        TaskStatus::InProgress => {
            task.status_meta.started_at = Some(now);
            task.status_meta.blocked_by.clear();
        }
        TaskStatus::Completed => {
            task.status_meta.completed_at = Some(now);
            if let Some(v) = verification {
                task.status_meta.verification = Some(v.to_string());
            }
        }
        TaskStatus::Blocked => {
            task.status_meta.blocked_at = Some(now);
            task.status_meta.blocked_by = step.blocked_by.clone();
            task.status_meta.reason = step.reason.clone();
        }
        TaskStatus::Cancelled => {
            task.status_meta.cancelled_at = Some(now);
            task.status_meta.reason = step.reason.clone();
        }
        TaskStatus::Pending => {
            task.status_meta.blocked_by.clear();
            task.status_meta.resolution = step.reason.clone();
        }
    }
    task.touch_status();
}
