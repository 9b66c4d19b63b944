//! Task entity
//!
//! The central record of the store: identity (id + path), classification,
//! status, relations, content, status metadata, and lifecycle stamps.
//! Tasks carry a monotonic version counter bumped on every committed
//! mutation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelErrorCode, ModelResult};
use super::id::generate_id;
use super::notes::NoteBoard;
use super::path::TaskPath;

/// Task classification.
///
/// `GROUP` is accepted on input as an alias of `MILESTONE`; internally a
/// single container kind exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "TASK")]
    Task,
    #[serde(rename = "MILESTONE", alias = "GROUP")]
    Milestone,
}

impl TaskKind {
    /// Whether tasks of this kind may contain children.
    pub fn is_container(&self) -> bool {
        matches!(self, TaskKind::Milestone)
    }

    /// Parent-child compatibility: a milestone contains plain tasks only,
    /// a plain task contains nothing.
    pub fn can_contain(&self, child: TaskKind) -> bool {
        match self {
            TaskKind::Milestone => child == TaskKind::Task,
            TaskKind::Task => false,
        }
    }

    /// Kind name for errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Task => "TASK",
            TaskKind::Milestone => "MILESTONE",
        }
    }
}

/// Task status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    /// Status name for errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// All statuses, in stable order.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
        TaskStatus::Cancelled,
    ];
}

/// Optional status metadata, written by transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// How completion was verified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
    /// Error diagnostics recorded on failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// Paths blocking this task, recorded on entering BLOCKED
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    /// Reason recorded on entering BLOCKED or CANCELLED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Resolution recorded when leaving BLOCKED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique id
    pub id: String,
    /// Hierarchical identity
    pub path: TaskPath,
    /// Parent path, absent for top-level tasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<TaskPath>,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Outgoing dependency targets, by path
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    #[serde(default)]
    pub notes: NoteBoard,
    #[serde(default)]
    pub status_meta: StatusMeta,
    /// Free-form annex, bounded at ingress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annex: Option<serde_json::Value>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub status_updated: DateTime<Utc>,
    /// Monotonic version counter, bumped per committed mutation
    pub version: u64,
}

impl Task {
    /// Create a new PENDING task at a path.
    ///
    /// The parent path is derived from the task path; validation of the
    /// parent's existence and kind compatibility happens at the index and
    /// validator layer.
    pub fn new(path: TaskPath, kind: TaskKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        let parent_path = path.parent();
        Self {
            id: generate_id(),
            path,
            parent_path,
            kind,
            status: TaskStatus::Pending,
            dependencies: BTreeSet::new(),
            name: name.into(),
            description: String::new(),
            reasoning: String::new(),
            notes: NoteBoard::default(),
            status_meta: StatusMeta::default(),
            annex: None,
            created: now,
            updated: now,
            status_updated: now,
            version: 1,
        }
    }

    /// Stamp a mutation: refresh `updated` and bump the version.
    pub fn touch(&mut self) {
        self.updated = Utc::now();
        self.version += 1;
    }

    /// Record a status change stamp on top of [`Task::touch`] semantics.
    pub fn touch_status(&mut self) {
        self.touch();
        self.status_updated = self.updated;
    }

    /// Validate everything checkable on this value alone.
    ///
    /// Referential checks (parent existence, dependency targets, cycles)
    /// belong to the validator; this enforces naming, note bounds, the
    /// annex bound, and self-reference.
    pub fn validate(
        &self,
        max_notes: usize,
        max_note_bytes: usize,
        max_annex_bytes: usize,
    ) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::missing_field("name"));
        }
        if self.dependencies.contains(self.path.as_str()) {
            return Err(ModelError::new(
                ModelErrorCode::InvalidValue,
                "dependencies",
                "task depends on itself",
            ));
        }
        if let Some(parent) = &self.parent_path {
            if parent == &self.path {
                return Err(ModelError::new(
                    ModelErrorCode::InvalidValue,
                    "parent_path",
                    "task is its own parent",
                ));
            }
            if !parent.is_parent_of(&self.path) {
                return Err(ModelError::new(
                    ModelErrorCode::InvalidValue,
                    "parent_path",
                    format!(
                        "parent_path {} does not prefix {}",
                        parent.as_str(),
                        self.path.as_str()
                    ),
                ));
            }
        }
        self.notes.validate(max_notes, max_note_bytes)?;
        if let Some(annex) = &self.annex {
            let size = serde_json::to_vec(annex).map(|v| v.len()).unwrap_or(0);
            if size > max_annex_bytes {
                return Err(ModelError::limit_exceeded(
                    "annex",
                    format!("annex is {} bytes, limit {}", size, max_annex_bytes),
                ));
            }
        }
        Ok(())
    }
}
