//! Store engine
//!
//! The facade over snapshot + WAL: point lookups, prefix scans, atomic
//! batches, checkpointing, and the integrity check. Writers are
//! serialised by the caller (the pool hands out the store behind a lock);
//! reads observe the consistent in-memory image.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::snapshot::SnapshotWriter;
use crate::wal::{WalOp, WalWriter};

use super::errors::{StoreError, StoreResult};
use super::record::StoreRecord;
use super::recovery::{self, RecoveryReport};
use super::verifier::{self, IntegrityReport};

/// An atomic multi-record write.
#[derive(Debug, Clone, Default)]
pub struct StoreBatch {
    ops: Vec<WalOp>,
}

impl StoreBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full-record write.
    pub fn put(&mut self, key: impl Into<String>, body: Value) -> &mut Self {
        self.ops.push(WalOp::Put {
            key: key.into(),
            body,
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WalOp::Delete { key: key.into() });
        self
    }

    /// Number of queued ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Keys touched by this batch, in op order.
    pub fn keys(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.key()).collect()
    }

    fn into_ops(self) -> Vec<WalOp> {
        self.ops
    }
}

/// Counters describing the store's current shape.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub record_count: u64,
    pub wal_bytes: u64,
    pub next_sequence: u64,
    pub degraded: bool,
}

/// The durable store.
#[derive(Debug)]
pub struct TaskStore {
    store_dir: PathBuf,
    records: BTreeMap<String, StoreRecord>,
    wal: WalWriter,
    degraded: bool,
    recovery: RecoveryReport,
}

impl TaskStore {
    /// Open the store, running ordered recovery.
    ///
    /// # Errors
    ///
    /// `STORAGE_INIT` wrapping the cause when the snapshot is
    /// unrecoverably corrupt or the directory cannot be prepared.
    pub fn open(store_dir: &Path) -> StoreResult<Self> {
        let (records, recovery) = recovery::recover(store_dir)
            .map_err(|e| StoreError::init(format!("store open failed: {}", e)))?;
        let wal = WalWriter::open(store_dir)?;
        Ok(Self {
            store_dir: store_dir.to_path_buf(),
            records,
            wal,
            degraded: false,
            recovery,
        })
    }

    /// What recovery found when this store was opened.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// The store directory.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Whether writes are currently rejected.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Point lookup.
    pub fn get(&self, key: &str) -> Option<&StoreRecord> {
        self.records.get(key)
    }

    /// Whether a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// All records whose key starts with `prefix`, in key order.
    pub fn range(&self, prefix: &str) -> Vec<&StoreRecord> {
        self.records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v)
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Single-record write.
    pub fn put(&mut self, key: impl Into<String>, body: Value) -> StoreResult<()> {
        let mut batch = StoreBatch::new();
        batch.put(key, body);
        self.apply(batch)
    }

    /// Single-record delete. Deleting an absent key is a no-op write.
    pub fn delete(&mut self, key: impl Into<String>) -> StoreResult<()> {
        let mut batch = StoreBatch::new();
        batch.delete(key);
        self.apply(batch)
    }

    /// Apply a batch atomically: one WAL frame, then the map.
    ///
    /// # Errors
    ///
    /// `STORAGE_DEGRADED` while the store is degraded; WAL failures
    /// leave the in-memory image untouched.
    pub fn apply(&mut self, batch: StoreBatch) -> StoreResult<()> {
        if self.degraded {
            return Err(StoreError::degraded());
        }
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();
        self.wal.append(ops.clone())?;
        recovery::apply_ops(&mut self.records, ops);
        Ok(())
    }

    /// Flush outstanding writes and fold the log into a fresh snapshot.
    ///
    /// Ordering: WAL fsync, snapshot write (atomic rename), then WAL
    /// truncation. A crash between the last two steps replays a log whose
    /// effects the snapshot already holds, which is idempotent.
    pub fn checkpoint(&mut self) -> StoreResult<u64> {
        self.wal.fsync()?;
        let records: Vec<StoreRecord> = self.records.values().cloned().collect();
        SnapshotWriter::new(&self.store_dir).write(&records)?;
        self.wal.truncate()?;
        Ok(records.len() as u64)
    }

    /// Run the integrity check. A clean report clears degraded mode; a
    /// dirty one enters it.
    pub fn verify(&mut self) -> IntegrityReport {
        let report = verifier::verify(&self.records);
        self.degraded = !report.is_clean();
        report
    }

    /// Mark the store degraded after an external corruption signal.
    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    /// Drop every record. Used by `clear_all` and import; WAL-logged so
    /// the wipe itself is durable.
    pub fn clear(&mut self) -> StoreResult<()> {
        if self.degraded {
            return Err(StoreError::degraded());
        }
        let keys: Vec<String> = self.records.keys().cloned().collect();
        if keys.is_empty() {
            return Ok(());
        }
        let mut batch = StoreBatch::new();
        for key in keys {
            batch.delete(key);
        }
        self.apply(batch)
    }

    /// Current store shape.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            record_count: self.records.len() as u64,
            wal_bytes: self.wal.size().unwrap_or(0),
            next_sequence: self.wal.next_sequence(),
            degraded: self.degraded,
        }
    }

    /// Iterate all records in key order.
    pub fn iter(&self) -> impl Iterator<Item = &StoreRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn put_get_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        store.put("task:proj/a", json!({"name": "a"})).unwrap();
        assert_eq!(store.get("task:proj/a").unwrap().body, json!({"name": "a"}));
        store.delete("task:proj/a").unwrap();
        assert!(store.get("task:proj/a").is_none());
    }

    #[test]
    fn reopen_recovers_state_from_wal() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(dir.path()).unwrap();
            store.put("task:proj/a", json!({"v": 1})).unwrap();
            store.put("task:proj/b", json!({"v": 2})).unwrap();
        }
        let store = TaskStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.recovery_report().replayed_entries, 2);
    }

    #[test]
    fn checkpoint_then_reopen_uses_snapshot() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(dir.path()).unwrap();
            store.put("task:proj/a", json!({"v": 1})).unwrap();
            store.checkpoint().unwrap();
            store.put("task:proj/b", json!({"v": 2})).unwrap();
        }
        let store = TaskStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.recovery_report().snapshot_records, 1);
        assert_eq!(store.recovery_report().replayed_entries, 1);
    }

    #[test]
    fn range_scans_by_prefix_in_order() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        store.put("task:proj/b", json!(2)).unwrap();
        store.put("task:proj/a", json!(1)).unwrap();
        store.put("project:proj", json!(0)).unwrap();
        let tasks = store.range("task:");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].key, "task:proj/a");
        assert_eq!(tasks[1].key, "task:proj/b");
    }

    #[test]
    fn batch_is_atomic_in_memory_and_on_disk() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(dir.path()).unwrap();
            let mut batch = StoreBatch::new();
            batch.put("task:proj/a", json!(1));
            batch.put("task:proj/b", json!(2));
            batch.delete("task:proj/a");
            store.apply(batch).unwrap();
            assert!(!store.contains("task:proj/a"));
            assert!(store.contains("task:proj/b"));
        }
        let store = TaskStore::open(dir.path()).unwrap();
        assert!(!store.contains("task:proj/a"));
        assert!(store.contains("task:proj/b"));
    }

    #[test]
    fn degraded_store_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let mut store = TaskStore::open(dir.path()).unwrap();
        store.mark_degraded();
        assert!(store.put("task:proj/a", json!(1)).is_err());
        // A clean verify restores service
        store.verify();
        assert!(!store.is_degraded());
        assert!(store.put("task:proj/a", json!(1)).is_ok());
    }
}
