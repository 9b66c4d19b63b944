//! Debounced auto-export and health checks
//!
//! Write events bump a change counter. [`BackupScheduler::tick`] runs
//! from the engine's background thread and starts an export when the
//! counter reaches the change threshold or the debounce window has
//! elapsed since the first unexported change, and no export is in
//! flight. A forced export awaits any in-flight export, runs
//! immediately, and resets both the counter and the debounce clock.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};

use crate::config::BackupConfig;
use crate::events::{EngineEvent, EventBus};
use crate::observability::{Logger, MetricsRegistry};
use crate::store::TaskStore;

use super::errors::BackupResult;
use super::exporter::{list_backups, BackupExporter};
use super::importer::BackupImporter;

#[derive(Debug, Default)]
struct SchedulerState {
    /// Writes since the last export
    changes: u64,
    /// When the first unexported change landed
    first_change: Option<Instant>,
    /// Serialises exports; tick skips while one is in flight
    in_flight: bool,
}

/// Scheduler gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub pending_changes: u64,
    pub exports_started: u64,
}

/// The scheduler.
pub struct BackupScheduler {
    store: Arc<RwLock<TaskStore>>,
    exporter: BackupExporter,
    config: BackupConfig,
    events: Arc<EventBus>,
    logger: Arc<Logger>,
    metrics: Arc<MetricsRegistry>,
    state: Mutex<SchedulerState>,
    exports_started: Mutex<u64>,
}

impl BackupScheduler {
    /// Wire the scheduler.
    pub fn new(
        store: Arc<RwLock<TaskStore>>,
        config: BackupConfig,
        events: Arc<EventBus>,
        logger: Arc<Logger>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let exporter = BackupExporter::new(&config.backup_dir, config.max_files);
        Self {
            store,
            exporter,
            config,
            events,
            logger,
            metrics,
            state: Mutex::new(SchedulerState::default()),
            exports_started: Mutex::new(0),
        }
    }

    /// Record one committed write.
    pub fn note_write(&self) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        state.changes += 1;
        if state.first_change.is_none() {
            state.first_change = Some(Instant::now());
        }
    }

    /// Debounce evaluation; runs an export when due.
    pub fn tick(&self) {
        let due = {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            if state.in_flight || state.changes == 0 {
                false
            } else {
                let elapsed = state
                    .first_change
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                let due = state.changes >= self.config.change_threshold
                    || elapsed >= Duration::from_millis(self.config.debounce_ms);
                if due {
                    state.in_flight = true;
                }
                due
            }
        };
        if due {
            self.run_export();
        }
    }

    /// Run an export now, awaiting any in-flight export first. Resets
    /// the change counter and the debounce clock.
    pub fn force_export(&self) -> BackupResult<PathBuf> {
        loop {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            if !state.in_flight {
                state.in_flight = true;
                break;
            }
            drop(state);
            std::thread::sleep(Duration::from_millis(10));
        }
        self.export_inner().map(|(path, _)| path)
    }

    fn run_export(&self) {
        let _ = self.export_inner();
    }

    /// The export body; clears in-flight and resets the counter on the
    /// way out.
    fn export_inner(&self) -> BackupResult<(PathBuf, u64)> {
        {
            let mut started = self.exports_started.lock().expect("scheduler lock poisoned");
            *started += 1;
        }
        let result = {
            let store = self
                .store
                .read()
                .map_err(|_| super::errors::BackupError::export_failed("store lock poisoned"));
            match store {
                Ok(store) => self.exporter.export(&store),
                Err(e) => Err(e),
            }
        };

        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state.in_flight = false;
            state.changes = 0;
            state.first_change = None;
        }

        match &result {
            Ok((path, records)) => {
                self.metrics.inc_backups();
                self.logger.info(
                    "backup_completed",
                    &[
                        ("file", path.display().to_string()),
                        ("records", records.to_string()),
                    ],
                );
                self.events.publish(&EngineEvent::BackupCompleted {
                    file: path.display().to_string(),
                    records: *records,
                });
            }
            Err(e) => {
                self.metrics.inc_backup_failures();
                self.logger
                    .error("backup_failed", &[("reason", e.to_string())]);
                self.events.publish(&EngineEvent::BackupFailed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    /// Run a retention sweep without exporting.
    pub fn sweep_retention(&self) -> BackupResult<()> {
        self.exporter.sweep()
    }

    /// Health check: a recent backup must exist; if not, trigger one.
    /// Also test-restores the latest backup when present.
    pub fn health_check(&self) {
        let recent = self.latest_backup_age().map(|age| {
            age <= Duration::from_millis(self.config.max_age_ms)
        });
        match recent {
            Some(true) => {
                if let Err(e) = BackupImporter::test_restore(&self.config.backup_dir) {
                    self.logger
                        .error("backup_health_failed", &[("reason", e.to_string())]);
                }
            }
            _ => {
                self.logger.warn("backup_stale", &[]);
                let _ = self.force_export();
            }
        }
    }

    fn latest_backup_age(&self) -> Option<Duration> {
        let backups = list_backups(&self.config.backup_dir).ok()?;
        let latest = backups.last()?;
        let modified = std::fs::metadata(latest).ok()?.modified().ok()?;
        SystemTime::now().duration_since(modified).ok()
    }

    /// Scheduler gauges.
    pub fn stats(&self) -> SchedulerStats {
        let state = self.state.lock().expect("scheduler lock poisoned");
        SchedulerStats {
            pending_changes: state.changes,
            exports_started: *self.exports_started.lock().expect("scheduler lock poisoned"),
        }
    }
}
