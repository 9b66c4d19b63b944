//! Shared test utilities

use std::sync::Arc;

use atlas::api::request::{ProjectSpec, TaskSpec};
use atlas::config::Config;
use atlas::engine::TaskEngine;
use tempfile::TempDir;

/// Bootstrap an engine over temp directories. The TempDir must outlive
/// the engine.
pub fn engine() -> (Arc<TaskEngine>, TempDir) {
    let root = TempDir::new().expect("failed to create temp dir");
    let mut config = Config::default();
    config.store.store_dir = root.path().join("store");
    config.backup.backup_dir = root.path().join("backups");
    config.log.log_dir = root.path().join("logs");
    config.log.log_level = "fatal".to_string();
    // Keep test retries fast
    config.transaction.retry_base_delay_ms = 1;
    let engine = TaskEngine::bootstrap(config).expect("bootstrap failed");
    (engine, root)
}

/// Create a project.
pub fn project(engine: &Arc<TaskEngine>, path: &str) {
    engine
        .create_projects(&[ProjectSpec {
            path: path.to_string(),
            name: format!("project {}", path),
            urls: Vec::new(),
        }])
        .expect("project create failed");
}

/// Spec for a plain task with dependencies.
pub fn task_spec(path: &str, deps: &[&str]) -> TaskSpec {
    TaskSpec {
        path: path.to_string(),
        kind: None,
        name: format!("task {}", path),
        description: None,
        reasoning: None,
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        annex: None,
    }
}
