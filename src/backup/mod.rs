//! Backup and export
//!
//! Produces restorable JSON snapshots of the full store under
//! `backups/atlas-backup-<iso-ts>.json`: a manifest (schema version,
//! per-kind record counts, per-record SHA-256 hashes) followed by the
//! records. Retention keeps the newest files up to the configured bound.
//!
//! Auto-export is debounced: write events bump a counter, and an export
//! runs when the counter reaches the change threshold or the debounce
//! window elapses, never concurrently with another export. A forced
//! export runs immediately, awaiting any in-flight export, and resets
//! the counter. The health check verifies a recent backup exists and
//! that the latest backup parses and passes its integrity checks without
//! touching the live store.

mod errors;
mod exporter;
mod importer;
mod manifest;
mod scheduler;

pub use errors::{BackupError, BackupErrorCode, BackupResult};
pub use exporter::{list_backups, BackupExporter};
pub use importer::{BackupImporter, RestoreCheck};
pub use manifest::{BackupFile, BackupManifest, BACKUP_SCHEMA_VERSION};
pub use scheduler::{BackupScheduler, SchedulerStats};
