//! Transition guards
//!
//! Guards run after the table check and consult the dependency and
//! hierarchy indexes:
//!
//! - `→ IN_PROGRESS`: every dependency COMPLETED, else the request is
//!   rewritten to `→ BLOCKED` with the blocking set
//! - `→ COMPLETED`: every dependency COMPLETED; every immediate child
//!   COMPLETED for a milestone
//! - `→ CANCELLED`: honoured from any status except COMPLETED

use crate::index::IndexSet;
use crate::model::{Task, TaskStatus};

use super::errors::StatusError;
use super::machine::transition_allowed;

/// What the guard decided.
#[derive(Debug, Clone)]
pub enum GuardDecision {
    /// Apply the transition as requested
    Proceed,
    /// Apply a different transition instead, reporting why
    Rewrite {
        to: TaskStatus,
        blocked_by: Vec<String>,
    },
    /// Reject the request
    Reject(StatusError),
}

/// Run the table check and the guard for one requested transition.
pub fn check_transition(task: &Task, to: TaskStatus, indexes: &IndexSet) -> GuardDecision {
    let from = task.status;
    if from == to {
        return GuardDecision::Reject(StatusError::invalid_transition(from, to));
    }

    // Cancellation overrides the table: any status except COMPLETED.
    if to == TaskStatus::Cancelled {
        if from == TaskStatus::Completed {
            return GuardDecision::Reject(StatusError::invalid_transition(from, to));
        }
        return GuardDecision::Proceed;
    }

    if !transition_allowed(from, to) {
        return GuardDecision::Reject(StatusError::invalid_transition(from, to));
    }

    match to {
        TaskStatus::InProgress => {
            let blocking = unready_dependencies(task, indexes);
            if blocking.is_empty() {
                GuardDecision::Proceed
            } else if transition_allowed(from, TaskStatus::Blocked) {
                GuardDecision::Rewrite {
                    to: TaskStatus::Blocked,
                    blocked_by: blocking,
                }
            } else {
                GuardDecision::Reject(StatusError::dependency_not_ready(blocking))
            }
        }
        TaskStatus::Completed => {
            let blocking = unready_dependencies(task, indexes);
            if !blocking.is_empty() {
                return GuardDecision::Reject(StatusError::dependency_not_ready(blocking));
            }
            if task.kind.is_container() {
                let unfinished = unfinished_children(task, indexes);
                if !unfinished.is_empty() {
                    return GuardDecision::Reject(StatusError::children_not_completed(unfinished));
                }
            }
            GuardDecision::Proceed
        }
        _ => GuardDecision::Proceed,
    }
}

/// Dependency targets of `task` that are not COMPLETED, in path order.
pub fn unready_dependencies(task: &Task, indexes: &IndexSet) -> Vec<String> {
    task.dependencies
        .iter()
        .filter(|dep| {
            indexes
                .primary
                .get_by_path(dep)
                .map(|t| t.status != TaskStatus::Completed)
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

/// Immediate children of `task` that are not COMPLETED, in path order.
/// CANCELLED children do not block a milestone.
fn unfinished_children(task: &Task, indexes: &IndexSet) -> Vec<String> {
    indexes
        .primary
        .children(task.path.as_str())
        .iter()
        .filter(|child| {
            !matches!(
                child.status,
                TaskStatus::Completed | TaskStatus::Cancelled
            )
        })
        .map(|child| child.path.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskKind, TaskPath};
    use std::sync::Arc;

    fn seed(set: &mut IndexSet, path: &str, kind: TaskKind, status: TaskStatus) -> Task {
        let mut task = Task::new(TaskPath::parse(path).unwrap(), kind, path);
        task.status = status;
        set.insert_task(Arc::new(task.clone())).unwrap();
        task
    }

    #[test]
    fn in_progress_with_unready_dep_rewrites_to_blocked() {
        let mut set = IndexSet::new(7, 100);
        seed(&mut set, "proj/a", TaskKind::Task, TaskStatus::Pending);
        let mut b = seed(&mut set, "proj/b", TaskKind::Task, TaskStatus::Pending);
        b.dependencies.insert("proj/a".to_string());

        match check_transition(&b, TaskStatus::InProgress, &set) {
            GuardDecision::Rewrite { to, blocked_by } => {
                assert_eq!(to, TaskStatus::Blocked);
                assert_eq!(blocked_by, vec!["proj/a"]);
            }
            other => panic!("expected rewrite, got {:?}", other),
        }
    }

    #[test]
    fn in_progress_with_completed_dep_proceeds() {
        let mut set = IndexSet::new(7, 100);
        seed(&mut set, "proj/a", TaskKind::Task, TaskStatus::Completed);
        let mut b = seed(&mut set, "proj/b", TaskKind::Task, TaskStatus::Pending);
        b.dependencies.insert("proj/a".to_string());

        assert!(matches!(
            check_transition(&b, TaskStatus::InProgress, &set),
            GuardDecision::Proceed
        ));
    }

    #[test]
    fn milestone_completion_requires_children_done() {
        let mut set = IndexSet::new(7, 100);
        let mut m = seed(&mut set, "proj/m", TaskKind::Milestone, TaskStatus::Pending);
        m.status = TaskStatus::InProgress;
        seed(&mut set, "proj/m/a", TaskKind::Task, TaskStatus::InProgress);

        match check_transition(&m, TaskStatus::Completed, &set) {
            GuardDecision::Reject(err) => {
                assert_eq!(err.code().as_str(), "CHILDREN_NOT_COMPLETED");
                assert_eq!(err.offenders(), ["proj/m/a"]);
            }
            other => panic!("expected reject, got {:?}", other),
        }
    }

    #[test]
    fn cancel_allowed_from_blocked_but_not_completed() {
        let set = IndexSet::new(7, 100);
        let mut t = Task::new(TaskPath::parse("proj/a").unwrap(), TaskKind::Task, "a");
        t.status = TaskStatus::Blocked;
        assert!(matches!(
            check_transition(&t, TaskStatus::Cancelled, &set),
            GuardDecision::Proceed
        ));
        t.status = TaskStatus::Completed;
        assert!(matches!(
            check_transition(&t, TaskStatus::Cancelled, &set),
            GuardDecision::Reject(_)
        ));
    }

    #[test]
    fn missing_dependency_target_counts_as_unready() {
        let set = IndexSet::new(7, 100);
        let mut t = Task::new(TaskPath::parse("proj/b").unwrap(), TaskKind::Task, "b");
        t.dependencies.insert("proj/ghost".to_string());
        assert_eq!(unready_dependencies(&t, &set), vec!["proj/ghost"]);
    }
}
