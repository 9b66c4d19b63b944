//! Entity model for the task store
//!
//! Value types for tasks, projects, knowledge items, whiteboards, and
//! dependency edges, together with path identity and ingress validation.
//!
//! Invariants enforced at this layer:
//!
//! - Paths parse per the segment grammar, depth and byte bounds
//! - Note categories respect per-category count and per-note length bounds
//! - Only container kinds may carry children
//! - The free-form annex never exceeds its byte bound
//!
//! Referential invariants (parents exist, dependency targets exist, no
//! cycles) live with the dependency validator and the index set; the model
//! layer validates everything that can be checked on a single value.

mod dependency;
mod errors;
mod id;
mod knowledge;
mod notes;
mod path;
mod project;
mod task;
mod whiteboard;

pub use dependency::{DependencyEdge, DependencyKind};
pub use errors::{ModelError, ModelErrorCode, ModelResult};
pub use id::generate_id;
pub use knowledge::KnowledgeItem;
pub use notes::{Note, NoteBoard, NoteCategory};
pub use path::TaskPath;
pub use project::{Project, ProjectStatus, ProjectUrl};
pub use task::{Task, TaskKind, TaskStatus, StatusMeta};
pub use whiteboard::{Whiteboard, WhiteboardVersion};

/// Store key for a task path.
pub fn task_key(path: &str) -> String {
    format!("task:{}", path)
}

/// Store key for a project path.
pub fn project_key(path: &str) -> String {
    format!("project:{}", path)
}

/// Store key for a knowledge item id.
pub fn knowledge_key(id: &str) -> String {
    format!("knowledge:{}", id)
}

/// Store key for a whiteboard name.
pub fn whiteboard_key(name: &str) -> String {
    format!("whiteboard:{}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_keys_are_namespaced() {
        assert_eq!(task_key("proj/a"), "task:proj/a");
        assert_eq!(project_key("proj"), "project:proj");
        assert_eq!(knowledge_key("k1"), "knowledge:k1");
        assert_eq!(whiteboard_key("scratch"), "whiteboard:scratch");
    }
}
