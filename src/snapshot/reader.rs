//! Snapshot loading with verification
//!
//! The header is parsed first; the records section is checksummed before
//! a single record is deserialized. Unrecoverable corruption fails the
//! open with a structured error rather than loading a partial store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::store::StoreRecord;
use crate::wal::compute_checksum;

use super::errors::{SnapshotError, SnapshotResult};
use super::header::SnapshotHeader;
use super::SNAPSHOT_FILE;

/// Loads and verifies snapshots.
pub struct SnapshotReader {
    snapshot_path: PathBuf,
}

impl SnapshotReader {
    /// Create a reader rooted at the store directory.
    pub fn new(store_dir: &Path) -> Self {
        Self {
            snapshot_path: store_dir.join(SNAPSHOT_FILE),
        }
    }

    /// Load the snapshot if one exists.
    ///
    /// Returns `Ok(None)` when no snapshot has been written yet.
    ///
    /// # Errors
    ///
    /// `SNAPSHOT_CORRUPTION` when the header is malformed, the records
    /// checksum does not match, the record count disagrees, or a record
    /// line fails to parse.
    pub fn read(&self) -> SnapshotResult<Option<(SnapshotHeader, Vec<StoreRecord>)>> {
        let raw = match fs::read(&self.snapshot_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SnapshotError::read_failed(
                    format!("failed to read snapshot: {}", self.snapshot_path.display()),
                    e,
                ))
            }
        };

        let newline = raw
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| SnapshotError::corruption("snapshot missing header line"))?;
        let header_line = std::str::from_utf8(&raw[..newline])
            .map_err(|_| SnapshotError::corruption("snapshot header is not UTF-8"))?;
        let header = SnapshotHeader::parse(header_line)?;

        let body = &raw[newline + 1..];
        let actual = compute_checksum(body);
        if actual != header.checksum {
            return Err(SnapshotError::corruption(format!(
                "records checksum mismatch: expected {:08x}, computed {:08x}",
                header.checksum, actual
            )));
        }

        let mut records = Vec::with_capacity(header.record_count as usize);
        for (lineno, line) in body.split(|b| *b == b'\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let record: StoreRecord = serde_json::from_slice(line).map_err(|e| {
                SnapshotError::corruption(format!("malformed record at line {}: {}", lineno + 2, e))
            })?;
            records.push(record);
        }

        if records.len() as u64 != header.record_count {
            return Err(SnapshotError::corruption(format!(
                "record count mismatch: header says {}, found {}",
                header.record_count,
                records.len()
            )));
        }

        Ok(Some((header, records)))
    }
}
