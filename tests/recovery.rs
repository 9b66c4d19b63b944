//! Ordered recovery through the engine
//!
//! Committed state survives an unclean stop; a checkpoint folds the WAL
//! into the snapshot without changing visible state; a torn WAL tail is
//! truncated at the last verifiable frame.

mod common;

use std::fs;
use std::sync::Arc;

use atlas::config::Config;
use atlas::engine::TaskEngine;
use atlas::model::TaskStatus;
use tempfile::TempDir;

use common::{project, task_spec};

fn config_for(root: &TempDir) -> Config {
    let mut config = Config::default();
    config.store.store_dir = root.path().join("store");
    config.backup.backup_dir = root.path().join("backups");
    config.log.log_dir = root.path().join("logs");
    config.log.log_level = "fatal".to_string();
    config
}

fn reopen(root: &TempDir) -> Arc<TaskEngine> {
    TaskEngine::bootstrap(config_for(root)).unwrap()
}

#[test]
fn committed_writes_survive_reopen_without_checkpoint() {
    let root = TempDir::new().unwrap();
    {
        let engine = reopen(&root);
        project(&engine, "proj");
        engine
            .create_tasks(&[task_spec("proj/a", &[]), task_spec("proj/b", &["proj/a"])])
            .unwrap();
        // No teardown: the WAL alone carries the state
    }
    let engine = reopen(&root);
    let task = engine.get_task("proj/b").unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.dependencies.len(), 1);
    let indexes = engine.indexes().read().unwrap();
    assert_eq!(indexes.primary.len(), 2);
    assert!(indexes.membership_consistent());
}

#[test]
fn checkpoint_then_reopen_is_identity() {
    let root = TempDir::new().unwrap();
    {
        let engine = reopen(&root);
        project(&engine, "proj");
        engine.create_tasks(&[task_spec("proj/a", &[])]).unwrap();
        let report = engine.checkpoint().unwrap();
        assert_eq!(report.operation, "checkpoint");
        engine.create_tasks(&[task_spec("proj/post", &[])]).unwrap();
        // A checkpoint alone never writes a backup
        assert!(!root.path().join("backups").exists());
    }
    let engine = reopen(&root);
    {
        let store = engine.store().read().unwrap();
        let report = store.recovery_report();
        // Snapshot carries the pre-checkpoint records, the WAL the rest
        assert!(report.snapshot_records >= 2);
        assert!(report.replayed_entries >= 1);
    }
    assert!(engine.get_task("proj/a").unwrap().is_some());
    assert!(engine.get_task("proj/post").unwrap().is_some());
}

#[test]
fn torn_wal_tail_is_truncated_on_open() {
    let root = TempDir::new().unwrap();
    {
        let engine = reopen(&root);
        project(&engine, "proj");
        engine.create_tasks(&[task_spec("proj/a", &[])]).unwrap();
    }

    // Tear the last frame in half
    let wal_path = root.path().join("store/wal.log");
    let bytes = fs::read(&wal_path).unwrap();
    fs::write(&wal_path, &bytes[..bytes.len() - 7]).unwrap();

    let engine = reopen(&root);
    {
        let store = engine.store().read().unwrap();
        assert!(store.recovery_report().truncated_tail.is_some());
    }
    // Earlier frames replayed fine
    assert!(engine.get_project("proj").unwrap().is_some());
    // The torn write is gone, and the store accepts new writes
    assert!(engine.get_task("proj/a").unwrap().is_none());
    engine.create_tasks(&[task_spec("proj/fresh", &[])]).unwrap();
}

#[test]
fn teardown_checkpoints_the_store() {
    let root = TempDir::new().unwrap();
    {
        let engine = reopen(&root);
        project(&engine, "proj");
        engine.create_tasks(&[task_spec("proj/a", &[])]).unwrap();
        engine.teardown().unwrap();
    }
    // After a clean teardown everything lives in the snapshot
    let engine = reopen(&root);
    let store = engine.store().read().unwrap();
    let report = store.recovery_report();
    assert_eq!(report.replayed_entries, 0);
    assert!(report.snapshot_records >= 2);
}
