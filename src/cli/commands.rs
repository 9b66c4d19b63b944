//! Command implementations

use serde_json::json;

use crate::config::Config;
use crate::engine::TaskEngine;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::print_result;

/// Run one CLI invocation end to end.
pub fn run_command(cli: Cli) -> CliResult<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.store_dir {
        config.store.store_dir = dir.clone();
    }

    let engine = TaskEngine::bootstrap(config)?;
    let result = dispatch(&engine, &cli.command);
    let teardown = engine.teardown();
    result?;
    teardown?;
    Ok(())
}

fn dispatch(engine: &std::sync::Arc<TaskEngine>, command: &Command) -> CliResult<()> {
    match command {
        Command::Init => {
            let stats = engine.stats()?;
            print_result(&json!({
                "status": "ok",
                "store_dir": engine.config().store.store_dir.display().to_string(),
                "records": stats.records,
            }));
            Ok(())
        }
        Command::Verify => {
            let report = engine.verify_store()?;
            if report.is_clean() {
                print_result(&json!({
                    "status": "ok",
                    "records_checked": report.records_checked,
                }));
                Ok(())
            } else {
                let issues: Vec<String> =
                    report.issues.iter().map(|i| format!("{:?}", i)).collect();
                print_result(&json!({
                    "status": "corrupt",
                    "records_checked": report.records_checked,
                    "issues": issues,
                }));
                Err(CliError::IntegrityFailed(report.issues.len()))
            }
        }
        Command::Checkpoint => {
            let report = engine.checkpoint()?;
            print_result(&json!({ "status": "ok", "details": report.details }));
            Ok(())
        }
        Command::Vacuum => {
            let report = engine.vacuum()?;
            print_result(&json!({ "status": "ok", "details": report.details }));
            Ok(())
        }
        Command::Export => {
            let path = engine.export()?;
            print_result(&json!({
                "status": "ok",
                "file": path.display().to_string(),
            }));
            Ok(())
        }
        Command::Import { file } => {
            let report = engine.import(file)?;
            print_result(&json!({ "status": "ok", "details": report.details }));
            Ok(())
        }
        Command::Stats => {
            let stats = engine.stats()?;
            let statuses: Vec<_> = stats
                .status_counts
                .iter()
                .map(|(status, count)| json!({ "status": status.as_str(), "count": count }))
                .collect();
            print_result(&json!({
                "records": stats.records,
                "tasks": stats.tasks,
                "wal_bytes": stats.wal_bytes,
                "degraded": stats.degraded,
                "cache_entries": stats.cache_entries,
                "pool": {
                    "active": stats.pool_active,
                    "idle": stats.pool_idle,
                    "waiting": stats.pool_waiting,
                },
                "statuses": statuses,
                "counters": stats.counters,
            }));
            Ok(())
        }
    }
}
