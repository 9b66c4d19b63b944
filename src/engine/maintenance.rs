//! Maintenance operations and statistics
//!
//! clear_all, vacuum, repair_relationships, export, import, and the
//! stats surface sampled by the CLI and the api layer.

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::backup::BackupImporter;
use crate::error::{EngineError, EngineResult};
use crate::index::RepairReport;
use crate::model::TaskStatus;

use super::TaskEngine;

/// What a maintenance pass did.
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub operation: String,
    pub details: serde_json::Value,
}

/// Engine-wide statistics snapshot.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub records: u64,
    pub tasks: u64,
    pub wal_bytes: u64,
    pub degraded: bool,
    pub cache_entries: u64,
    pub pool_active: usize,
    pub pool_idle: usize,
    pub pool_waiting: usize,
    pub status_counts: Vec<(TaskStatus, usize)>,
    pub counters: serde_json::Value,
}

impl TaskEngine {
    /// Wipe the store, all indexes, and both caches.
    pub fn clear_all(&self) -> EngineResult<MaintenanceReport> {
        let removed = {
            let mut store = self
                .store()
                .write()
                .map_err(|_| EngineError::internal("maintenance.clear_all", "store lock poisoned"))?;
            let removed = store.len() as u64;
            store.clear()?;
            removed
        };
        {
            let mut indexes = self
                .indexes()
                .write()
                .map_err(|_| EngineError::internal("maintenance.clear_all", "index lock poisoned"))?;
            indexes.clear();
        }
        self.cache().clear();
        self.query().results().clear();
        self.logger()
            .info("clear_all", &[("records_removed", removed.to_string())]);
        Ok(MaintenanceReport {
            operation: "clear_all".to_string(),
            details: json!({ "records_removed": removed }),
        })
    }

    /// Checkpoint the store: fold the WAL into a fresh snapshot.
    /// Backups are untouched; vacuum layers the retention sweep on top.
    pub fn checkpoint(&self) -> EngineResult<MaintenanceReport> {
        let records = {
            let mut store = self.store().write().map_err(|_| {
                EngineError::internal("maintenance.checkpoint", "store lock poisoned")
            })?;
            store.checkpoint()?
        };
        self.metrics().inc_checkpoints();
        self.logger()
            .info("checkpoint", &[("snapshot_records", records.to_string())]);
        Ok(MaintenanceReport {
            operation: "checkpoint".to_string(),
            details: json!({ "snapshot_records": records }),
        })
    }

    /// Checkpoint plus a backup retention sweep.
    pub fn vacuum(&self) -> EngineResult<MaintenanceReport> {
        let checkpoint = self.checkpoint()?;
        self.backup().sweep_retention()?;
        self.logger().info("vacuum", &[]);
        Ok(MaintenanceReport {
            operation: "vacuum".to_string(),
            details: checkpoint.details,
        })
    }

    /// Drop orphan index entries and re-derive children lists.
    pub fn repair_relationships(&self) -> EngineResult<MaintenanceReport> {
        let report: RepairReport = {
            let mut indexes = self
                .indexes()
                .write()
                .map_err(|_| EngineError::internal("maintenance.repair", "index lock poisoned"))?;
            indexes.repair()
        };
        self.cache().clear();
        Ok(MaintenanceReport {
            operation: "repair_relationships".to_string(),
            details: json!({
                "changed": report.changed(),
                "status_orphans_removed": report.status_orphans_removed,
                "hierarchy_orphans_removed": report.hierarchy_orphans_removed,
                "dependency_orphans_removed": report.dependency_orphans_removed,
                "children_relinked": report.children_relinked,
            }),
        })
    }

    /// Force an export now.
    pub fn export(&self) -> EngineResult<PathBuf> {
        self.backup().force_export().map_err(EngineError::from)
    }

    /// Import a backup file, replacing the store, then rebuild every
    /// index and drop both caches.
    pub fn import(&self, file: &Path) -> EngineResult<MaintenanceReport> {
        let count = {
            let mut store = self
                .store()
                .write()
                .map_err(|_| EngineError::internal("maintenance.import", "store lock poisoned"))?;
            BackupImporter::import(file, &mut store)?
        };
        {
            let store = self
                .store()
                .read()
                .map_err(|_| EngineError::internal("maintenance.import", "store lock poisoned"))?;
            let mut indexes = self
                .indexes()
                .write()
                .map_err(|_| EngineError::internal("maintenance.import", "index lock poisoned"))?;
            indexes.rebuild(&store)?;
        }
        self.cache().clear();
        self.query().results().clear();
        self.logger().info(
            "import",
            &[
                ("file", file.display().to_string()),
                ("records", count.to_string()),
            ],
        );
        Ok(MaintenanceReport {
            operation: "import".to_string(),
            details: json!({ "records": count, "file": file.display().to_string() }),
        })
    }

    /// Sample the engine's shape.
    pub fn stats(&self) -> EngineResult<EngineStats> {
        let (records, wal_bytes, degraded) = {
            let store = self
                .store()
                .read()
                .map_err(|_| EngineError::internal("maintenance.stats", "store lock poisoned"))?;
            let stats = store.stats();
            (stats.record_count, stats.wal_bytes, stats.degraded)
        };
        let (tasks, status_counts) = {
            let indexes = self
                .indexes()
                .read()
                .map_err(|_| EngineError::internal("maintenance.stats", "index lock poisoned"))?;
            let counts: Vec<(TaskStatus, usize)> = TaskStatus::ALL
                .iter()
                .map(|s| (*s, indexes.status.count(*s)))
                .collect();
            (indexes.primary.len() as u64, counts)
        };
        let pool = self.pool().stats();
        Ok(EngineStats {
            records,
            tasks,
            wal_bytes,
            degraded,
            cache_entries: self.cache().stats().entries,
            pool_active: pool.active,
            pool_idle: pool.idle,
            pool_waiting: pool.waiting,
            status_counts,
            counters: self.metrics().sample(),
        })
    }

    /// Run the store integrity check; a clean pass restores service
    /// after degradation.
    pub fn verify_store(&self) -> EngineResult<crate::store::IntegrityReport> {
        let mut store = self
            .store()
            .write()
            .map_err(|_| EngineError::internal("maintenance.verify", "store lock poisoned"))?;
        Ok(store.verify())
    }
}
