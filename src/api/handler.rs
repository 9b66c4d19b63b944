//! Request dispatch
//!
//! Translates the typed operation vocabulary into engine calls and
//! wraps every outcome in the response envelope. This is the single
//! place errors turn into `{success: false, error}` payloads.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::engine::{RequestContext, TaskEngine};
use crate::error::EngineResult;

use super::errors::ApiError;
use super::request::{Operation, Request, RequestMode};
use super::response::Response;

/// Handle one request.
pub fn handle(engine: &Arc<TaskEngine>, request: Request) -> Response {
    let ctx = RequestContext::new(request.operation.name());
    let result = dispatch(engine, &request);
    let response = match result {
        Ok(response) => response,
        Err(e) => Response::fail(e),
    };
    engine.logger().info(
        "request",
        &[
            ("operation", ctx.operation.clone()),
            ("request_id", ctx.request_id.to_string()),
            ("elapsed_ms", ctx.elapsed_ms().to_string()),
            ("success", response.success.to_string()),
        ],
    );
    response
}

fn dispatch(engine: &Arc<TaskEngine>, request: &Request) -> EngineResult<Response> {
    match &request.operation {
        Operation::ProjectCreate(payload) => {
            check_bulk(request.mode, payload.is_bulk(), payload.items().len())?;
            let projects = engine.create_projects(&payload.items())?;
            Ok(Response::ok(serde_json::to_value(projects).unwrap_or_default()))
        }
        Operation::ProjectUpdate(spec) => {
            let project = engine.update_project(spec)?;
            Ok(Response::ok(serde_json::to_value(project).unwrap_or_default()))
        }
        Operation::ProjectDelete(payload) => {
            check_bulk(request.mode, payload.is_bulk(), payload.items().len())?;
            let mut removed = 0u64;
            for item in payload.items() {
                removed += engine.delete_project(&item.path)?;
            }
            Ok(Response::ok(json!({ "tasks_removed": removed })))
        }
        Operation::ProjectList => {
            let projects = engine.list_projects()?;
            Ok(Response::ok(serde_json::to_value(projects).unwrap_or_default()))
        }
        Operation::ProjectGet(path) => match engine.get_project(&path.path)? {
            Some(project) => Ok(Response::ok(serde_json::to_value(project).unwrap_or_default())),
            None => Err(crate::error::EngineError::not_found("project.get", &path.path)),
        },

        Operation::TaskCreate(payload) => {
            check_bulk(request.mode, payload.is_bulk(), payload.items().len())?;
            let tasks = engine.create_tasks(&payload.items())?;
            let rendered: Vec<_> = tasks
                .iter()
                .map(|t| serde_json::to_value(t.as_ref()).unwrap_or_default())
                .collect();
            Ok(Response::ok(json!(rendered)))
        }
        Operation::TaskUpdate(spec) => {
            let (task, plan) = engine.update_task(spec)?;
            let mut data = serde_json::to_value(task.as_ref()).unwrap_or_default();
            if let Some(plan) = plan {
                if let Some(rewritten) = plan.rewritten_from {
                    data["auto_transition"] = json!({
                        "requested": rewritten.as_str(),
                        "applied": plan.primary().to.as_str(),
                        "blocked_by": plan.primary().blocked_by,
                    });
                }
            }
            Ok(Response::ok(data))
        }
        Operation::TaskDelete(payload) => {
            check_bulk(request.mode, payload.is_bulk(), payload.items().len())?;
            let mut removed = 0u64;
            for item in payload.items() {
                removed += engine.delete_task(&item.path)?;
            }
            Ok(Response::ok(json!({ "tasks_removed": removed })))
        }
        Operation::TaskList(spec) => {
            let tasks = engine.list_tasks(spec)?;
            Ok(render_tasks(&tasks))
        }
        Operation::TaskGet(path) | Operation::TaskGetByPath(path) => {
            match engine.get_task(&path.path)? {
                Some(task) => Ok(Response::ok(
                    serde_json::to_value(task.as_ref()).unwrap_or_default(),
                )),
                None => Err(crate::error::EngineError::not_found("task.get", &path.path)),
            }
        }
        Operation::TaskGetChildren(path) => {
            let tasks = engine.get_children(&path.path)?;
            Ok(render_tasks(&tasks))
        }
        Operation::TaskGetByStatus { status } => {
            let tasks = engine.get_by_status(*status)?;
            Ok(render_tasks(&tasks))
        }

        Operation::DependencyAdd(spec) => {
            let edge = engine.add_dependency(spec)?;
            Ok(Response::ok(serde_json::to_value(edge).unwrap_or_default()))
        }
        Operation::DependencyRemove { source, target } => {
            engine.remove_dependency(source, target)?;
            Ok(Response::empty())
        }
        Operation::DependencyList(path) => {
            let (outgoing, inbound) = engine.list_dependencies(&path.path)?;
            Ok(Response::ok(json!({
                "outgoing": outgoing,
                "inbound": inbound,
            })))
        }

        Operation::KnowledgeCreate(spec) => {
            let item = engine.create_knowledge(spec)?;
            Ok(Response::ok(serde_json::to_value(item).unwrap_or_default()))
        }
        Operation::KnowledgeUpdate(spec) => {
            let item = engine.update_knowledge(spec)?;
            Ok(Response::ok(serde_json::to_value(item).unwrap_or_default()))
        }
        Operation::KnowledgeDelete { id } => {
            engine.delete_knowledge(id)?;
            Ok(Response::empty())
        }
        Operation::KnowledgeList => {
            let items = engine.list_knowledge()?;
            Ok(Response::ok(serde_json::to_value(items).unwrap_or_default()))
        }
        Operation::KnowledgeGetByProject(path) => {
            let items = engine.knowledge_by_project(&path.path)?;
            Ok(Response::ok(serde_json::to_value(items).unwrap_or_default()))
        }

        Operation::WhiteboardCreate { name, data } => {
            let board = engine.create_whiteboard(name, data.clone())?;
            Ok(Response::ok(json!({
                "name": board.name,
                "version": board.current_version(),
            })))
        }
        Operation::WhiteboardUpdate { name, data } => {
            let version = engine.update_whiteboard(name, data.clone())?;
            Ok(Response::ok(json!({ "name": name, "version": version })))
        }
        Operation::WhiteboardGet { name, version } => {
            match engine.get_whiteboard(name, *version)? {
                Some(data) => Ok(Response::ok(data)),
                None => Err(crate::error::EngineError::not_found("whiteboard.get", name)),
            }
        }
        Operation::WhiteboardDelete { name } => {
            engine.delete_whiteboard(name)?;
            Ok(Response::empty())
        }

        Operation::MaintenanceClearAll => {
            let report = engine.clear_all()?;
            Ok(Response::ok(report.details))
        }
        Operation::MaintenanceVacuum => {
            let report = engine.vacuum()?;
            Ok(Response::ok(report.details))
        }
        Operation::MaintenanceRepairRelationships => {
            let report = engine.repair_relationships()?;
            Ok(Response::ok(report.details))
        }
        Operation::MaintenanceExport => {
            let path = engine.export()?;
            Ok(Response::ok(json!({ "file": path.display().to_string() })))
        }
        Operation::MaintenanceImport { file } => {
            let report = engine.import(&PathBuf::from(file))?;
            Ok(Response::ok(report.details))
        }
    }
}

fn check_bulk(mode: RequestMode, is_bulk: bool, items: usize) -> EngineResult<()> {
    if mode == RequestMode::Bulk || is_bulk {
        if items == 0 || items > 100 {
            return Err(ApiError::BadBulkSize(items).into());
        }
    }
    Ok(())
}

fn render_tasks(tasks: &[Arc<crate::model::Task>]) -> Response {
    let rendered: Vec<_> = tasks
        .iter()
        .map(|t| serde_json::to_value(t.as_ref()).unwrap_or_default())
        .collect();
    Response::ok(json!(rendered))
}
