//! Dependency edge operations
//!
//! Edges are validated against the whole graph before anything stages:
//! both endpoints must exist and the new edge must not close a cycle.
//! Validation and staging run under the source path's write lock, so
//! the graph cannot change between the check and the commit. The task
//! body carries the target set; the dependency index carries the edge
//! kind.

use std::sync::Arc;

use crate::api::request::DependencySpec;
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::{DependencyEdge, TaskPath};
use crate::txn::TxOp;
use crate::validate::DependencyValidator;

use super::TaskEngine;

impl TaskEngine {
    /// Add a dependency edge.
    pub fn add_dependency(&self, spec: &DependencySpec) -> EngineResult<DependencyEdge> {
        let source_path = TaskPath::parse(&spec.source)?;
        let _ = TaskPath::parse(&spec.target)?;

        self.with_txn(Some(source_path.as_str()), |txn| {
            let (edge, updated) = {
                let indexes = self
                    .indexes()
                    .read()
                    .map_err(|_| EngineError::internal("dependency.add", "index lock poisoned"))?;
                let validator = DependencyValidator::new(
                    &indexes,
                    self.config().limits.max_dependency_depth,
                );
                let report = validator.validate_edge(&spec.source, &spec.target);
                if !report.valid {
                    return Err(report.into_engine_error("dependency.add"));
                }
                if indexes.dependency.has_edge(&spec.source, &spec.target) {
                    return Err(EngineError::new(
                        ErrorCode::Duplicate,
                        "dependency.add",
                        format!("edge {} -> {} already exists", spec.source, spec.target),
                    ));
                }
                let source = indexes
                    .primary
                    .get_by_path(source_path.as_str())
                    .ok_or_else(|| EngineError::not_found("dependency.add", &spec.source))?;
                let mut edge =
                    DependencyEdge::new(spec.source.clone(), spec.target.clone(), spec.kind);
                edge.description = spec.description.clone();
                let mut updated = (*source).clone();
                updated.dependencies.insert(spec.target.clone());
                updated.touch();
                (edge, Arc::new(updated))
            };

            // Edge first: the upsert's outgoing sync then sees the edge
            // registered and keeps its kind.
            self.stage(txn, TxOp::AddEdge(edge.clone()))?;
            self.stage(txn, TxOp::UpsertTask(Arc::clone(&updated)))?;
            Ok(edge)
        })
    }

    /// Remove a dependency edge. The upsert's outgoing sync drops the
    /// index entry once the target leaves the task body.
    pub fn remove_dependency(&self, source: &str, target: &str) -> EngineResult<()> {
        let source_path = TaskPath::parse(source)?;
        self.with_txn(Some(source_path.as_str()), |txn| {
            let updated = {
                let indexes = self
                    .indexes()
                    .read()
                    .map_err(|_| {
                        EngineError::internal("dependency.remove", "index lock poisoned")
                    })?;
                if !indexes.dependency.has_edge(source, target) {
                    return Err(EngineError::not_found(
                        "dependency.remove",
                        format!("{} -> {}", source, target),
                    ));
                }
                let task = indexes
                    .primary
                    .get_by_path(source_path.as_str())
                    .ok_or_else(|| EngineError::not_found("dependency.remove", source))?;
                let mut updated = (*task).clone();
                updated.dependencies.remove(target);
                updated.touch();
                Arc::new(updated)
            };

            self.stage(txn, TxOp::UpsertTask(Arc::clone(&updated)))?;
            Ok(())
        })
    }

    /// Outgoing edges and inbound source paths of a path.
    pub fn list_dependencies(
        &self,
        path: &str,
    ) -> EngineResult<(Vec<DependencyEdge>, Vec<String>)> {
        let indexes = self
            .indexes()
            .read()
            .map_err(|_| EngineError::internal("dependency.list", "index lock poisoned"))?;
        let outgoing: Vec<DependencyEdge> = indexes
            .dependency
            .edges_from(path)
            .into_iter()
            .cloned()
            .collect();
        let inbound = indexes.dependency.dependents_of(path);
        Ok((outgoing, inbound))
    }
}
