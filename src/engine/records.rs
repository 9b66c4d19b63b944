//! Project, knowledge, and whiteboard operations
//!
//! These entities live as plain store records; only tasks carry the
//! full index set. Writes still go through the coordinator so they
//! share the same durability and event semantics, and each existence
//! or duplicate check runs inside the transaction closure, under the
//! engine write lock, so it cannot go stale before the commit.

use serde_json::json;

use crate::api::request::{
    KnowledgeSpec, KnowledgeUpdateSpec, ProjectSpec, ProjectUpdateSpec,
};
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::{
    knowledge_key, project_key, whiteboard_key, KnowledgeItem, Project, TaskPath, Whiteboard,
};
use crate::txn::TxOp;

use super::TaskEngine;

impl TaskEngine {
    /// Create projects atomically; bulk accepts 1-100 items.
    pub fn create_projects(&self, specs: &[ProjectSpec]) -> EngineResult<Vec<Project>> {
        if specs.is_empty() || specs.len() > 100 {
            return Err(EngineError::new(
                ErrorCode::LimitExceeded,
                "project.create",
                format!("bulk accepts 1-100 items, got {}", specs.len()),
            ));
        }
        self.with_txn(None, |txn| {
            let mut built: Vec<Project> = Vec::new();
            {
                let store = self
                    .store()
                    .read()
                    .map_err(|_| EngineError::internal("project.create", "store lock poisoned"))?;
                for spec in specs {
                    let path = TaskPath::parse(&spec.path)?;
                    if store.contains(&project_key(path.as_str()))
                        || built.iter().any(|p| p.path == path)
                    {
                        return Err(EngineError::new(
                            ErrorCode::Duplicate,
                            "project.create",
                            format!("project already exists: {}", path.as_str()),
                        ));
                    }
                    let mut project = Project::new(path, spec.name.clone())?;
                    project.urls = spec.urls.clone();
                    project.validate()?;
                    built.push(project);
                }
            }

            for project in &built {
                let body = serde_json::to_value(project)
                    .map_err(|e| EngineError::internal("project.create", e.to_string()))?;
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

    /// Update a project's name, status, or URL list.
    pub fn update_project(&self, spec: &ProjectUpdateSpec) -> EngineResult<Project> {
        self.with_txn(None, |txn| {
            let mut project = self
                .load_project(&spec.path)?
                .ok_or_else(|| EngineError::not_found("project.update", &spec.path))?;
            if let Some(name) = &spec.name {
                project.name = name.clone();
            }
            if let Some(status) = spec.status {
                project.status = status;
            }
            if let Some(urls) = &spec.urls {
                project.urls = urls.clone();
            }
            project.validate()?;
            project.touch();

            let body = serde_json::to_value(&project)
                .map_err(|e| EngineError::internal("project.update", e.to_string()))?;
            self.stage(
                txn,
                TxOp::PutRecord {
                    key: project_key(project.path.as_str()),
                    body,
                },
            )?;
            Ok(project)
        })
    }

    /// Delete a project and every task under it.
    ///
    /// The cascade commits one subtree at a time; each deletion holds
    /// its own path lock. The project record is removed last.
    pub fn delete_project(&self, path: &str) -> EngineResult<u64> {
        let project = self
            .load_project(path)?
            .ok_or_else(|| EngineError::not_found("project.delete", path))?;

        let mut removed = 0u64;
        let tasks: Vec<String> = project.tasks.iter().cloned().collect();
        for task_path in tasks {
            removed += self.delete_task(&task_path)?;
        }

        self.with_txn(None, |txn| {
            self.stage(
                txn,
                TxOp::DeleteRecord {
                    key: project_key(project.path.as_str()),
                },
            )?;
            Ok(())
        })?;
        Ok(removed)
    }

    /// All projects, in path order.
    pub fn list_projects(&self) -> EngineResult<Vec<Project>> {
        let store = self
            .store()
            .read()
            .map_err(|_| EngineError::internal("project.list", "store lock poisoned"))?;
        store
            .range("project:")
            .into_iter()
            .map(|record| {
                serde_json::from_value(record.body.clone())
                    .map_err(|e| EngineError::internal("project.list", e.to_string()))
            })
            .collect()
    }

    /// One project.
    pub fn get_project(&self, path: &str) -> EngineResult<Option<Project>> {
        self.load_project(path)
    }

    /// Create a knowledge item under a project.
    pub fn create_knowledge(&self, spec: &KnowledgeSpec) -> EngineResult<KnowledgeItem> {
        let project_path = TaskPath::parse(&spec.project_path)?;
        self.with_txn(None, |txn| {
            if self.load_project(project_path.as_str())?.is_none() {
                return Err(EngineError::new(
                    ErrorCode::InvalidReference,
                    "knowledge.create",
                    format!("project does not exist: {}", project_path.as_str()),
                ));
            }
            let mut item = KnowledgeItem::new(project_path.clone(), spec.text.clone());
            item.tags = spec.tags.iter().cloned().collect();
            item.domain = spec.domain.clone();
            item.citations = spec.citations.clone();
            item.validate()?;

            let body = serde_json::to_value(&item)
                .map_err(|e| EngineError::internal("knowledge.create", e.to_string()))?;
            self.stage(
                txn,
                TxOp::PutRecord {
                    key: knowledge_key(&item.id),
                    body,
                },
            )?;
            Ok(item)
        })
    }

    /// Update a knowledge item.
    pub fn update_knowledge(&self, spec: &KnowledgeUpdateSpec) -> EngineResult<KnowledgeItem> {
        self.with_txn(None, |txn| {
            let mut item = self
                .load_knowledge(&spec.id)?
                .ok_or_else(|| EngineError::not_found("knowledge.update", &spec.id))?;
            if let Some(text) = &spec.text {
                item.text = text.clone();
            }
            if let Some(tags) = &spec.tags {
                item.tags = tags.iter().cloned().collect();
            }
            if let Some(domain) = &spec.domain {
                item.domain = Some(domain.clone());
            }
            if let Some(citations) = &spec.citations {
                item.citations = citations.clone();
            }
            item.validate()?;
            item.touch();

            let body = serde_json::to_value(&item)
                .map_err(|e| EngineError::internal("knowledge.update", e.to_string()))?;
            self.stage(
                txn,
                TxOp::PutRecord {
                    key: knowledge_key(&item.id),
                    body,
                },
            )?;
            Ok(item)
        })
    }

    /// Delete a knowledge item.
    pub fn delete_knowledge(&self, id: &str) -> EngineResult<()> {
        self.with_txn(None, |txn| {
            if self.load_knowledge(id)?.is_none() {
                return Err(EngineError::not_found("knowledge.delete", id));
            }
            self.stage(
                txn,
                TxOp::DeleteRecord {
                    key: knowledge_key(id),
                },
            )?;
            Ok(())
        })
    }

    /// All knowledge items.
    pub fn list_knowledge(&self) -> EngineResult<Vec<KnowledgeItem>> {
        let store = self
            .store()
            .read()
            .map_err(|_| EngineError::internal("knowledge.list", "store lock poisoned"))?;
        store
            .range("knowledge:")
            .into_iter()
            .map(|record| {
                serde_json::from_value(record.body.clone())
                    .map_err(|e| EngineError::internal("knowledge.list", e.to_string()))
            })
            .collect()
    }

    /// Knowledge items belonging to one project.
    pub fn knowledge_by_project(&self, project_path: &str) -> EngineResult<Vec<KnowledgeItem>> {
        Ok(self
            .list_knowledge()?
            .into_iter()
            .filter(|item| item.project_path.as_str() == project_path)
            .collect())
    }

    fn load_knowledge(&self, id: &str) -> EngineResult<Option<KnowledgeItem>> {
        let store = self
            .store()
            .read()
            .map_err(|_| EngineError::internal("knowledge.get", "store lock poisoned"))?;
        match store.get(&knowledge_key(id)) {
            Some(record) => Ok(Some(
                serde_json::from_value(record.body.clone())
                    .map_err(|e| EngineError::internal("knowledge.get", e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Create a whiteboard with an initial version.
    pub fn create_whiteboard(
        &self,
        name: &str,
        data: serde_json::Value,
    ) -> EngineResult<Whiteboard> {
        self.with_txn(None, |txn| {
            if self.load_whiteboard(name)?.is_some() {
                return Err(EngineError::new(
                    ErrorCode::Duplicate,
                    "whiteboard.create",
                    format!("whiteboard already exists: {}", name),
                ));
            }
            let board = Whiteboard::new(name, data)?;
            let body = serde_json::to_value(&board)
                .map_err(|e| EngineError::internal("whiteboard.create", e.to_string()))?;
            self.stage(
                txn,
                TxOp::PutRecord {
                    key: whiteboard_key(&board.name),
                    body,
                },
            )?;
            Ok(board)
        })
    }

    /// Append a version to a whiteboard. Returns the new version number.
    pub fn update_whiteboard(&self, name: &str, data: serde_json::Value) -> EngineResult<u64> {
        self.with_txn(None, |txn| {
            let mut board = self
                .load_whiteboard(name)?
                .ok_or_else(|| EngineError::not_found("whiteboard.update", name))?;
            let version = board.put(data);
            let body = serde_json::to_value(&board)
                .map_err(|e| EngineError::internal("whiteboard.update", e.to_string()))?;
            self.stage(
                txn,
                TxOp::PutRecord {
                    key: whiteboard_key(&board.name),
                    body,
                },
            )?;
            Ok(version)
        })
    }

    /// Fetch a whiteboard version; `None` selects the current one.
    pub fn get_whiteboard(
        &self,
        name: &str,
        version: Option<u64>,
    ) -> EngineResult<Option<serde_json::Value>> {
        match self.load_whiteboard(name)? {
            Some(board) => Ok(board.get(version).map(|v| {
                json!({
                    "name": board.name,
                    "version": v.version,
                    "data": v.data,
                    "created": v.created,
                })
            })),
            None => Ok(None),
        }
    }

    /// Delete a whiteboard with its whole history.
    pub fn delete_whiteboard(&self, name: &str) -> EngineResult<()> {
        self.with_txn(None, |txn| {
            if self.load_whiteboard(name)?.is_none() {
                return Err(EngineError::not_found("whiteboard.delete", name));
            }
            self.stage(
                txn,
                TxOp::DeleteRecord {
                    key: whiteboard_key(name),
                },
            )?;
            Ok(())
        })
    }

    fn load_whiteboard(&self, name: &str) -> EngineResult<Option<Whiteboard>> {
        let store = self
            .store()
            .read()
            .map_err(|_| EngineError::internal("whiteboard.get", "store lock poisoned"))?;
        match store.get(&whiteboard_key(name)) {
            Some(record) => Ok(Some(
                serde_json::from_value(record.body.clone())
                    .map_err(|e| EngineError::internal("whiteboard.get", e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}
