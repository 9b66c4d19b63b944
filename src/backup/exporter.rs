//! Export side
//!
//! Writes the full record set as one backup file and sweeps retention.
//! Exports are read-only over the store.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::store::TaskStore;

use super::errors::{BackupError, BackupResult};
use super::manifest::{BackupFile, BackupManifest};

/// File name prefix for backups.
const BACKUP_PREFIX: &str = "atlas-backup-";

/// Writes backups.
pub struct BackupExporter {
    backup_dir: PathBuf,
    max_files: usize,
}

impl BackupExporter {
    /// Exporter rooted at the backup directory.
    pub fn new(backup_dir: &Path, max_files: usize) -> Self {
        Self {
            backup_dir: backup_dir.to_path_buf(),
            max_files,
        }
    }

    /// Export the store. Returns the backup path and record count.
    pub fn export(&self, store: &TaskStore) -> BackupResult<(PathBuf, u64)> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            BackupError::export_io(
                format!("failed to create backup directory: {}", self.backup_dir.display()),
                e,
            )
        })?;

        let records: Vec<_> = store.iter().cloned().collect();
        let count = records.len() as u64;
        let file = BackupFile {
            manifest: BackupManifest::over(&records),
            records,
        };
        let raw = serde_json::to_string_pretty(&file)
            .map_err(|e| BackupError::export_failed(format!("serialization failed: {}", e)))?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let path = self.backup_dir.join(format!("{}{}.json", BACKUP_PREFIX, stamp));
        let tmp = path.with_extension("json.tmp");
        {
            let mut out = File::create(&tmp).map_err(|e| {
                BackupError::export_io(format!("failed to create {}", tmp.display()), e)
            })?;
            out.write_all(raw.as_bytes())
                .map_err(|e| BackupError::export_io("failed to write backup", e))?;
            out.sync_all()
                .map_err(|e| BackupError::export_io("failed to fsync backup", e))?;
        }
        fs::rename(&tmp, &path)
            .map_err(|e| BackupError::export_io("failed to publish backup", e))?;

        self.sweep()?;
        Ok((path, count))
    }

    /// Remove oldest backups beyond the retention bound.
    pub fn sweep(&self) -> BackupResult<()> {
        let mut backups = list_backups(&self.backup_dir)?;
        while backups.len() > self.max_files {
            let oldest = backups.remove(0);
            fs::remove_file(&oldest)
                .map_err(|e| BackupError::export_io("failed to remove old backup", e))?;
        }
        Ok(())
    }
}

/// Backup files in the directory, oldest first. Names embed the
/// timestamp, so lexicographic order is chronological.
pub fn list_backups(backup_dir: &Path) -> BackupResult<Vec<PathBuf>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(backup_dir)
        .map_err(|e| BackupError::export_io("failed to read backup directory", e))?;
    let mut backups: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();
    backups.sort();
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded_store(dir: &Path) -> TaskStore {
        let mut store = TaskStore::open(dir).unwrap();
        store.put("task:proj/a", json!({"name": "a"})).unwrap();
        store.put("project:proj", json!({"name": "p"})).unwrap();
        store
    }

    #[test]
    fn export_writes_parseable_backup() {
        let store_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let store = seeded_store(store_dir.path());

        let exporter = BackupExporter::new(backup_dir.path(), 10);
        let (path, count) = exporter.export(&store).unwrap();
        assert_eq!(count, 2);

        let raw = fs::read_to_string(path).unwrap();
        let file = BackupFile::parse(&raw).unwrap();
        assert_eq!(file.manifest.record_count, 2);
    }

    #[test]
    fn retention_keeps_newest() {
        let store_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let store = seeded_store(store_dir.path());

        let exporter = BackupExporter::new(backup_dir.path(), 2);
        let mut paths = Vec::new();
        for _ in 0..4 {
            std::thread::sleep(std::time::Duration::from_millis(5));
            paths.push(exporter.export(&store).unwrap().0);
        }
        let kept = list_backups(backup_dir.path()).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1], paths[3]);
        assert!(!paths[0].exists());
    }
}
