//! Status transition table
//!
//! The per-task finite automaton. Allowed transitions:
//!
//! | From        | To                                  |
//! |-------------|-------------------------------------|
//! | PENDING     | IN_PROGRESS, BLOCKED, CANCELLED     |
//! | IN_PROGRESS | COMPLETED, BLOCKED, CANCELLED       |
//! | BLOCKED     | PENDING, IN_PROGRESS                |
//! | CANCELLED   | PENDING                             |
//! | COMPLETED   | IN_PROGRESS (reopen)                |
//!
//! Everything else is rejected as INVALID_TRANSITION. Guards over the
//! dependency and hierarchy indexes live in the sibling module; this
//! table is pure.

use crate::model::TaskStatus;

/// Whether `from → to` appears in the transition table.
pub fn transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress)
            | (Pending, Blocked)
            | (Pending, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Blocked)
            | (InProgress, Cancelled)
            | (Blocked, Pending)
            | (Blocked, InProgress)
            | (Cancelled, Pending)
            | (Completed, InProgress)
    )
}

/// Targets reachable from `from` in one step, in stable order.
pub fn allowed_targets(from: TaskStatus) -> Vec<TaskStatus> {
    TaskStatus::ALL
        .iter()
        .copied()
        .filter(|to| transition_allowed(from, *to))
        .collect()
}
