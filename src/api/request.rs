//! Request and payload types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    DependencyKind, NoteCategory, ProjectStatus, ProjectUrl, TaskKind, TaskStatus,
};

/// Single or bulk execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    #[default]
    Single,
    Bulk,
}

/// Response rendering hint passed through to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Json,
    Compact,
}

/// One incoming request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
}

/// Single-or-many payload wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BulkOr<T> {
    Bulk(Vec<T>),
    Single(T),
}

impl<T: Clone> BulkOr<T> {
    /// Flatten into a list.
    pub fn items(&self) -> Vec<T> {
        match self {
            BulkOr::Single(item) => vec![item.clone()],
            BulkOr::Bulk(items) => items.clone(),
        }
    }

    /// Whether this payload carries multiple items.
    pub fn is_bulk(&self) -> bool {
        matches!(self, BulkOr::Bulk(_))
    }
}

/// The operation vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    // Projects
    ProjectCreate(BulkOr<ProjectSpec>),
    ProjectUpdate(ProjectUpdateSpec),
    ProjectDelete(BulkOr<PathRef>),
    ProjectList,
    ProjectGet(PathRef),

    // Tasks
    TaskCreate(BulkOr<TaskSpec>),
    TaskUpdate(TaskUpdateSpec),
    TaskDelete(BulkOr<PathRef>),
    TaskList(TaskListSpec),
    TaskGet(PathRef),
    TaskGetChildren(PathRef),
    TaskGetByStatus { status: TaskStatus },
    TaskGetByPath(PathRef),

    // Dependencies
    DependencyAdd(DependencySpec),
    DependencyRemove { source: String, target: String },
    DependencyList(PathRef),

    // Knowledge
    KnowledgeCreate(KnowledgeSpec),
    KnowledgeUpdate(KnowledgeUpdateSpec),
    KnowledgeDelete { id: String },
    KnowledgeList,
    KnowledgeGetByProject(PathRef),

    // Whiteboards
    WhiteboardCreate { name: String, data: Value },
    WhiteboardUpdate { name: String, data: Value },
    WhiteboardGet { name: String, version: Option<u64> },
    WhiteboardDelete { name: String },

    // Maintenance
    MaintenanceClearAll,
    MaintenanceVacuum,
    MaintenanceRepairRelationships,
    MaintenanceExport,
    MaintenanceImport { file: String },
}

impl Operation {
    /// Operation name for logs and error envelopes.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ProjectCreate(_) => "project.create",
            Operation::ProjectUpdate(_) => "project.update",
            Operation::ProjectDelete(_) => "project.delete",
            Operation::ProjectList => "project.list",
            Operation::ProjectGet(_) => "project.get",
            Operation::TaskCreate(_) => "task.create",
            Operation::TaskUpdate(_) => "task.update",
            Operation::TaskDelete(_) => "task.delete",
            Operation::TaskList(_) => "task.list",
            Operation::TaskGet(_) => "task.get",
            Operation::TaskGetChildren(_) => "task.get_children",
            Operation::TaskGetByStatus { .. } => "task.get_by_status",
            Operation::TaskGetByPath(_) => "task.get_by_path",
            Operation::DependencyAdd(_) => "dependency.add",
            Operation::DependencyRemove { .. } => "dependency.remove",
            Operation::DependencyList(_) => "dependency.list",
            Operation::KnowledgeCreate(_) => "knowledge.create",
            Operation::KnowledgeUpdate(_) => "knowledge.update",
            Operation::KnowledgeDelete { .. } => "knowledge.delete",
            Operation::KnowledgeList => "knowledge.list",
            Operation::KnowledgeGetByProject(_) => "knowledge.get_by_project",
            Operation::WhiteboardCreate { .. } => "whiteboard.create",
            Operation::WhiteboardUpdate { .. } => "whiteboard.update",
            Operation::WhiteboardGet { .. } => "whiteboard.get",
            Operation::WhiteboardDelete { .. } => "whiteboard.delete",
            Operation::MaintenanceClearAll => "maintenance.clear_all",
            Operation::MaintenanceVacuum => "maintenance.vacuum",
            Operation::MaintenanceRepairRelationships => "maintenance.repair_relationships",
            Operation::MaintenanceExport => "maintenance.export",
            Operation::MaintenanceImport { .. } => "maintenance.import",
        }
    }
}

/// Reference to a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRef {
    pub path: String,
}

/// New project payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub urls: Vec<ProjectUrl>,
}

/// Project update payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUpdateSpec {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub urls: Option<Vec<ProjectUrl>>,
}

/// New task payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub path: String,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub annex: Option<Value>,
}

/// Note append payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSpec {
    pub category: NoteCategory,
    pub text: String,
}

/// Task update payload. Absent fields stay untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateSpec {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Reason carried into status metadata on BLOCKED/CANCELLED
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    /// Completion verification note
    #[serde(default)]
    pub verification: Option<String>,
    #[serde(default)]
    pub annex: Option<Value>,
    #[serde(default)]
    pub add_note: Option<NoteSpec>,
    /// Replaces the whole dependency set when present
    #[serde(default)]
    pub set_dependencies: Option<Vec<String>>,
}

/// Task listing payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskListSpec {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    /// Substring or `*`/`?` glob over name and description
    #[serde(default)]
    pub text: Option<String>,
    /// path | name | created | updated
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub descending: Option<bool>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// New dependency edge payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    pub source: String,
    pub target: String,
    #[serde(default = "default_kind")]
    pub kind: DependencyKind,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_kind() -> DependencyKind {
    DependencyKind::Requires
}

/// New knowledge item payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSpec {
    pub project_path: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Knowledge update payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeUpdateSpec {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub citations: Option<Vec<String>>,
}
