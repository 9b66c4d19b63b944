//! Import and test-restore
//!
//! Import replaces the store contents with a verified backup in one
//! atomic batch. Test-restore verifies the latest backup parses and
//! passes integrity checks without touching the live store.

use std::fs;
use std::path::Path;

use crate::store::{StoreBatch, TaskStore};

use super::errors::{BackupError, BackupResult};
use super::exporter::list_backups;
use super::manifest::BackupFile;

/// What a test-restore found.
#[derive(Debug, Clone)]
pub struct RestoreCheck {
    pub backup: String,
    pub record_count: u64,
    pub ok: bool,
}

/// Applies backups.
pub struct BackupImporter;

impl BackupImporter {
    /// Import a backup file, replacing the store contents.
    ///
    /// The whole replacement is one atomic batch: the wipe and every
    /// restored record commit together.
    pub fn import(path: &Path, store: &mut TaskStore) -> BackupResult<u64> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BackupError::import_failed(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file = BackupFile::parse(&raw)?;

        let mut batch = StoreBatch::new();
        let existing: Vec<String> = store.iter().map(|r| r.key.clone()).collect();
        for key in existing {
            batch.delete(key);
        }
        let count = file.records.len() as u64;
        for record in file.records {
            batch.put(record.key, record.body);
        }
        store
            .apply(batch)
            .map_err(|e| BackupError::import_failed(format!("store apply failed: {}", e)))?;
        Ok(count)
    }

    /// Verify the latest backup without restoring it.
    pub fn test_restore(backup_dir: &Path) -> BackupResult<RestoreCheck> {
        let backups = list_backups(backup_dir)?;
        let latest = backups
            .last()
            .ok_or_else(|| BackupError::import_failed("no backups present"))?;
        let raw = fs::read_to_string(latest).map_err(|e| {
            BackupError::import_failed(format!("failed to read {}: {}", latest.display(), e))
        })?;
        let file = BackupFile::parse(&raw)?;
        Ok(RestoreCheck {
            backup: latest.display().to_string(),
            record_count: file.manifest.record_count,
            ok: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupExporter;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn export_wipe_import_round_trips() {
        let store_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(store_dir.path()).unwrap();
        store.put("task:proj/a", json!({"name": "a"})).unwrap();
        store.put("task:proj/b", json!({"name": "b"})).unwrap();

        let exporter = BackupExporter::new(backup_dir.path(), 10);
        let (path, _) = exporter.export(&store).unwrap();

        store.clear().unwrap();
        assert!(store.is_empty());

        let count = BackupImporter::import(&path, &mut store).unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.get("task:proj/a").unwrap().body, json!({"name": "a"}));
    }

    #[test]
    fn import_replaces_existing_contents() {
        let store_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(store_dir.path()).unwrap();
        store.put("task:proj/old", json!({"name": "old"})).unwrap();

        let exporter = BackupExporter::new(backup_dir.path(), 10);
        let (path, _) = exporter.export(&store).unwrap();

        store.put("task:proj/extra", json!({"name": "extra"})).unwrap();
        BackupImporter::import(&path, &mut store).unwrap();
        assert!(store.get("task:proj/extra").is_none());
        assert!(store.get("task:proj/old").is_some());
    }

    #[test]
    fn test_restore_flags_tampering_without_touching_store() {
        let store_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(store_dir.path()).unwrap();
        store.put("task:proj/a", json!({"name": "a"})).unwrap();
        let exporter = BackupExporter::new(backup_dir.path(), 10);
        let (path, _) = exporter.export(&store).unwrap();

        assert!(BackupImporter::test_restore(backup_dir.path()).unwrap().ok);

        // Tamper with the backup body
        let raw = fs::read_to_string(&path).unwrap();
        fs::write(&path, raw.replace("\"a\"", "\"tampered\"")).unwrap();
        assert!(BackupImporter::test_restore(backup_dir.path()).is_err());
        // Live store untouched
        assert_eq!(store.get("task:proj/a").unwrap().body, json!({"name": "a"}));
    }
}
