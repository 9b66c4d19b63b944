//! Ordered recovery
//!
//! Rebuilds the in-memory record map on open: snapshot first, then WAL
//! replay in sequence order. A torn or corrupt WAL tail is truncated to
//! the last verifiable frame and reported; corruption in the snapshot
//! itself is unrecoverable and fails the open.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

use crate::snapshot::SnapshotReader;
use crate::wal::{TailReport, WalOp, WalReader, WAL_FILE};

use super::errors::{StoreError, StoreResult};
use super::record::StoreRecord;

/// What recovery found and did.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Records loaded from the snapshot
    pub snapshot_records: u64,
    /// WAL entries replayed on top
    pub replayed_entries: u64,
    /// Highest sequence number observed during replay
    pub last_sequence: u64,
    /// Present when a torn or corrupt tail was truncated
    pub truncated_tail: Option<TailReport>,
}

/// Load the snapshot and replay the WAL into a record map.
pub fn recover(store_dir: &Path) -> StoreResult<(BTreeMap<String, StoreRecord>, RecoveryReport)> {
    let mut records = BTreeMap::new();
    let mut report = RecoveryReport::default();

    if let Some((header, snapshot_records)) = SnapshotReader::new(store_dir).read()? {
        report.snapshot_records = header.record_count;
        for record in snapshot_records {
            records.insert(record.key.clone(), record);
        }
    }

    let wal_path = store_dir.join(WAL_FILE);
    if wal_path.exists() {
        let mut reader = WalReader::open(&wal_path)?;
        let mut last_sequence = 0u64;
        while let Some(entry) = reader.read_next()? {
            if entry.sequence <= last_sequence {
                return Err(StoreError::corrupt(format!(
                    "WAL sequence regressed: {} after {}",
                    entry.sequence, last_sequence
                )));
            }
            last_sequence = entry.sequence;
            apply_ops(&mut records, entry.ops);
            report.replayed_entries += 1;
        }
        report.last_sequence = last_sequence;

        if let Some(tail) = reader.tail_report().cloned() {
            truncate_tail(&wal_path, tail.valid_up_to)?;
            report.truncated_tail = Some(tail);
        }
    }

    Ok((records, report))
}

/// Apply one entry's ops to the map, in order.
pub fn apply_ops(records: &mut BTreeMap<String, StoreRecord>, ops: Vec<WalOp>) {
    for op in ops {
        match op {
            WalOp::Put { key, body } => {
                records.insert(key.clone(), StoreRecord::new(key, body));
            }
            WalOp::Delete { key } => {
                records.remove(&key);
            }
        }
    }
}

fn truncate_tail(wal_path: &Path, valid_up_to: u64) -> StoreResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(wal_path)
        .map_err(|e| StoreError::io("failed to open WAL for tail truncation", e))?;
    file.set_len(valid_up_to)
        .map_err(|e| StoreError::io("failed to truncate WAL tail", e))?;
    file.sync_all()
        .map_err(|e| StoreError::io("failed to fsync WAL after tail truncation", e))?;
    Ok(())
}
