//! Snapshot creation
//!
//! Writes the full record set to a temporary file, fsyncs, then renames
//! over `snapshot.bin`. The previous snapshot stays intact until the
//! rename, so a crash mid-write loses nothing.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::store::StoreRecord;
use crate::wal::compute_checksum;

use super::errors::{SnapshotError, SnapshotResult};
use super::header::SnapshotHeader;
use super::SNAPSHOT_FILE;

/// Writes snapshots atomically.
pub struct SnapshotWriter {
    store_dir: PathBuf,
}

impl SnapshotWriter {
    /// Create a writer rooted at the store directory.
    pub fn new(store_dir: &Path) -> Self {
        Self {
            store_dir: store_dir.to_path_buf(),
        }
    }

    /// Path of the live snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.store_dir.join(SNAPSHOT_FILE)
    }

    /// Write all records as a new snapshot.
    ///
    /// Records must be sorted by key; the caller iterates its canonical
    /// ordered map, so sorting here would only mask a bug.
    pub fn write(&self, records: &[StoreRecord]) -> SnapshotResult<SnapshotHeader> {
        let mut body = Vec::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| {
                SnapshotError::corruption(format!("record serialization failed: {}", e))
            })?;
            body.extend_from_slice(line.as_bytes());
            body.push(b'\n');
        }

        let header = SnapshotHeader::new(records.len() as u64, compute_checksum(&body));
        let header_line = serde_json::to_string(&header).map_err(|e| {
            SnapshotError::corruption(format!("header serialization failed: {}", e))
        })?;

        if !self.store_dir.exists() {
            fs::create_dir_all(&self.store_dir).map_err(|e| {
                SnapshotError::write_failed(
                    format!("failed to create store directory: {}", self.store_dir.display()),
                    e,
                )
            })?;
        }

        let tmp_path = self.store_dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        {
            let mut file = File::create(&tmp_path).map_err(|e| {
                SnapshotError::write_failed(
                    format!("failed to create snapshot temp file: {}", tmp_path.display()),
                    e,
                )
            })?;
            file.write_all(header_line.as_bytes())
                .and_then(|_| file.write_all(b"\n"))
                .and_then(|_| file.write_all(&body))
                .map_err(|e| SnapshotError::write_failed("failed to write snapshot", e))?;
            file.sync_all()
                .map_err(|e| SnapshotError::write_failed("failed to fsync snapshot", e))?;
        }

        fs::rename(&tmp_path, self.snapshot_path())
            .map_err(|e| SnapshotError::write_failed("failed to publish snapshot", e))?;
        self.fsync_dir()?;
        Ok(header)
    }

    fn fsync_dir(&self) -> SnapshotResult<()> {
        // Directory fsync makes the rename itself durable
        let dir = OpenOptions::new()
            .read(true)
            .open(&self.store_dir)
            .map_err(|e| SnapshotError::write_failed("failed to open store directory", e))?;
        dir.sync_all()
            .map_err(|e| SnapshotError::write_failed("failed to fsync store directory", e))
    }
}
