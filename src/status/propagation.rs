//! Transition planning and propagation
//!
//! Turns one requested transition into the ordered list of steps the
//! coordinator commits as a single unit:
//!
//! - completing a task moves BLOCKED dependents back to PENDING when all
//!   of their dependencies are then COMPLETED
//! - cancelling a task cascades to non-COMPLETED descendants, and to
//!   dependents whose `requires` edge on the task leaves them no
//!   satisfying chain
//!
//! When several dependents could move, the order is the dependency
//! index's deterministic iteration resolved to task id order.

use std::collections::BTreeSet;

use crate::index::IndexSet;
use crate::model::{DependencyKind, Task, TaskStatus};

use super::errors::StatusResult;
use super::guards::{check_transition, unready_dependencies, GuardDecision};

/// One step of a committed transition group.
#[derive(Debug, Clone)]
pub struct TransitionStep {
    pub task_id: String,
    pub path: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// True when the engine produced this step rather than the caller
    pub auto: bool,
    /// Blocking paths recorded when entering BLOCKED
    pub blocked_by: Vec<String>,
    /// Reason carried into status metadata
    pub reason: Option<String>,
}

/// The full group for one request, primary step first.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub steps: Vec<TransitionStep>,
    /// Set when the primary step was rewritten from the original request
    pub rewritten_from: Option<TaskStatus>,
}

impl TransitionPlan {
    /// The primary step.
    pub fn primary(&self) -> &TransitionStep {
        &self.steps[0]
    }
}

/// Plan a transition for `task` to `requested`.
///
/// The plan is computed against the current index image and committed
/// atomically by the coordinator; nothing is mutated here.
pub fn plan_transition(
    task: &Task,
    requested: TaskStatus,
    reason: Option<String>,
    indexes: &IndexSet,
) -> StatusResult<TransitionPlan> {
    let decision = check_transition(task, requested, indexes);
    let (target, blocked_by, rewritten_from) = match decision {
        GuardDecision::Proceed => (requested, Vec::new(), None),
        GuardDecision::Rewrite { to, blocked_by } => (to, blocked_by, Some(requested)),
        GuardDecision::Reject(err) => return Err(err),
    };

    let mut steps = vec![TransitionStep {
        task_id: task.id.clone(),
        path: task.path.as_str().to_string(),
        from: task.status,
        to: target,
        auto: rewritten_from.is_some(),
        blocked_by,
        reason,
    }];

    match target {
        TaskStatus::Completed => {
            steps.extend(unblock_dependents(task, indexes));
        }
        TaskStatus::Cancelled => {
            steps.extend(cancel_descendants(task, indexes));
            steps.extend(cancel_dependents(task, indexes));
        }
        _ => {}
    }

    Ok(TransitionPlan {
        steps,
        rewritten_from,
    })
}

/// BLOCKED dependents whose whole dependency set is COMPLETED once
/// `completed` lands, in task id order.
fn unblock_dependents(completed: &Task, indexes: &IndexSet) -> Vec<TransitionStep> {
    let mut candidates: Vec<TransitionStep> = Vec::new();
    for dependent_path in indexes.dependency.dependents_of(completed.path.as_str()) {
        let dependent = match indexes.primary.get_by_path(&dependent_path) {
            Some(t) => t,
            None => continue,
        };
        if dependent.status != TaskStatus::Blocked {
            continue;
        }
        let still_blocking: Vec<String> = unready_dependencies(&dependent, indexes)
            .into_iter()
            .filter(|p| p != completed.path.as_str())
            .collect();
        if still_blocking.is_empty() {
            candidates.push(TransitionStep {
                task_id: dependent.id.clone(),
                path: dependent.path.as_str().to_string(),
                from: TaskStatus::Blocked,
                to: TaskStatus::Pending,
                auto: true,
                blocked_by: Vec::new(),
                reason: Some(format!("unblocked by completion of {}", completed.path)),
            });
        }
    }
    candidates.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    candidates
}

/// Non-COMPLETED descendants of a cancelled task, depth-first, emitted
/// in task id order.
fn cancel_descendants(cancelled: &Task, indexes: &IndexSet) -> Vec<TransitionStep> {
    let mut steps: Vec<TransitionStep> = indexes
        .primary
        .descendants(cancelled.path.as_str())
        .filter(|t| !matches!(t.status, TaskStatus::Completed | TaskStatus::Cancelled))
        .map(|t| TransitionStep {
            task_id: t.id.clone(),
            path: t.path.as_str().to_string(),
            from: t.status,
            to: TaskStatus::Cancelled,
            auto: true,
            blocked_by: Vec::new(),
            reason: Some(format!("cascaded from cancellation of {}", cancelled.path)),
        })
        .collect();
    steps.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    steps
}

/// Dependents holding a `requires` edge on the cancelled task. Advisory
/// edge kinds (extends, implements, references) leave a satisfying
/// chain, so they do not cascade.
fn cancel_dependents(cancelled: &Task, indexes: &IndexSet) -> Vec<TransitionStep> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut steps: Vec<TransitionStep> = Vec::new();
    for dependent_path in indexes.dependency.dependents_of(cancelled.path.as_str()) {
        let requires = indexes
            .dependency
            .edges_from(&dependent_path)
            .iter()
            .any(|e| e.target == cancelled.path.as_str() && e.kind == DependencyKind::Requires);
        if !requires {
            continue;
        }
        let dependent = match indexes.primary.get_by_path(&dependent_path) {
            Some(t) => t,
            None => continue,
        };
        if matches!(
            dependent.status,
            TaskStatus::Completed | TaskStatus::Cancelled
        ) {
            continue;
        }
        if seen.insert(dependent.id.clone()) {
            steps.push(TransitionStep {
                task_id: dependent.id.clone(),
                path: dependent.path.as_str().to_string(),
                from: dependent.status,
                to: TaskStatus::Cancelled,
                auto: true,
                blocked_by: Vec::new(),
                reason: Some(format!(
                    "required dependency {} was cancelled",
                    cancelled.path
                )),
            });
        }
    }
    steps.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyEdge, TaskKind, TaskPath};
    use std::sync::Arc;

    fn seed(set: &mut IndexSet, path: &str, kind: TaskKind, status: TaskStatus) -> Task {
        let mut task = Task::new(TaskPath::parse(path).unwrap(), kind, path);
        task.status = status;
        set.insert_task(Arc::new(task.clone())).unwrap();
        task
    }

    fn seed_dep(set: &mut IndexSet, path: &str, status: TaskStatus, deps: &[&str]) -> Task {
        let mut task = Task::new(TaskPath::parse(path).unwrap(), TaskKind::Task, path);
        task.status = status;
        for dep in deps {
            task.dependencies.insert(dep.to_string());
        }
        set.insert_task(Arc::new(task.clone())).unwrap();
        task
    }

    #[test]
    fn completion_unblocks_ready_dependents() {
        let mut set = IndexSet::new(7, 100);
        let mut a = seed(&mut set, "proj/a", TaskKind::Task, TaskStatus::InProgress);
        seed_dep(&mut set, "proj/b", TaskStatus::Blocked, &["proj/a"]);

        a.status = TaskStatus::InProgress;
        let plan = plan_transition(&a, TaskStatus::Completed, None, &set).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].path, "proj/b");
        assert_eq!(plan.steps[1].to, TaskStatus::Pending);
        assert!(plan.steps[1].auto);
    }

    #[test]
    fn completion_leaves_dependents_with_other_blockers() {
        let mut set = IndexSet::new(7, 100);
        let a = seed(&mut set, "proj/a", TaskKind::Task, TaskStatus::InProgress);
        seed(&mut set, "proj/c", TaskKind::Task, TaskStatus::Pending);
        seed_dep(&mut set, "proj/b", TaskStatus::Blocked, &["proj/a", "proj/c"]);

        let plan = plan_transition(&a, TaskStatus::Completed, None, &set).unwrap();
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn cancellation_cascades_to_children_and_requires_dependents() {
        let mut set = IndexSet::new(7, 100);
        let root = seed(&mut set, "proj/m", TaskKind::Milestone, TaskStatus::InProgress);
        seed(&mut set, "proj/m/x", TaskKind::Task, TaskStatus::InProgress);
        seed(&mut set, "proj/m/y", TaskKind::Task, TaskStatus::Completed);
        seed_dep(&mut set, "proj/z", TaskStatus::Pending, &["proj/m"]);

        let plan = plan_transition(&root, TaskStatus::Cancelled, None, &set).unwrap();
        let cancelled: Vec<&str> = plan.steps.iter().map(|s| s.path.as_str()).collect();
        assert!(cancelled.contains(&"proj/m"));
        assert!(cancelled.contains(&"proj/m/x"));
        assert!(cancelled.contains(&"proj/z"));
        // Completed child untouched
        assert!(!cancelled.contains(&"proj/m/y"));
    }

    #[test]
    fn advisory_edges_do_not_cascade_cancellation() {
        let mut set = IndexSet::new(7, 100);
        let a = seed(&mut set, "proj/a", TaskKind::Task, TaskStatus::Pending);
        seed(&mut set, "proj/b", TaskKind::Task, TaskStatus::Pending);
        set.dependency
            .add(DependencyEdge::new(
                "proj/b",
                "proj/a",
                DependencyKind::References,
            ))
            .unwrap();

        let plan = plan_transition(&a, TaskStatus::Cancelled, None, &set).unwrap();
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn rewrite_is_recorded_on_the_plan() {
        let mut set = IndexSet::new(7, 100);
        seed(&mut set, "proj/a", TaskKind::Task, TaskStatus::Pending);
        let b = seed_dep(&mut set, "proj/b", TaskStatus::Pending, &["proj/a"]);

        let plan = plan_transition(&b, TaskStatus::InProgress, None, &set).unwrap();
        assert_eq!(plan.rewritten_from, Some(TaskStatus::InProgress));
        assert_eq!(plan.primary().to, TaskStatus::Blocked);
        assert_eq!(plan.primary().blocked_by, vec!["proj/a"]);
    }
}
