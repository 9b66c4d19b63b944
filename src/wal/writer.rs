//! WAL writer with fsync enforcement
//!
//! Every append is followed by fsync. Acknowledgment before fsync is
//! forbidden. The file is append-only between checkpoints; a checkpoint
//! truncates it to zero after the snapshot is durable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::checksum::compute_checksum;
use super::errors::{WalError, WalResult};
use super::reader::WalReader;
use super::record::{WalEntry, WalOp};
use super::WAL_FILE;

/// Appends frames to the log and enforces durability.
#[derive(Debug)]
pub struct WalWriter {
    wal_path: PathBuf,
    file: File,
    /// Next sequence number to assign (starts at 1, never reused)
    next_sequence: u64,
}

impl WalWriter {
    /// Open or create `<store_dir>/wal.log`.
    ///
    /// Scans any existing log to continue the sequence numbering.
    pub fn open(store_dir: &Path) -> WalResult<Self> {
        if !store_dir.exists() {
            fs::create_dir_all(store_dir).map_err(|e| {
                WalError::append_failed(
                    format!("failed to create store directory: {}", store_dir.display()),
                    e,
                )
            })?;
        }
        let wal_path = store_dir.join(WAL_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| {
                WalError::append_failed(
                    format!("failed to open WAL file: {}", wal_path.display()),
                    e,
                )
            })?;
        let next_sequence = Self::determine_next_sequence(&wal_path)?;
        Ok(Self {
            wal_path,
            file,
            next_sequence,
        })
    }

    /// Continue numbering after the highest verifiable sequence on disk.
    fn determine_next_sequence(wal_path: &Path) -> WalResult<u64> {
        let metadata = match fs::metadata(wal_path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(WalError::append_failed("failed to read WAL metadata", e)),
        };
        if metadata.len() == 0 {
            return Ok(1);
        }
        let mut reader = WalReader::open(wal_path)?;
        let mut max_sequence = 0u64;
        while let Some(entry) = reader.read_next()? {
            max_sequence = max_sequence.max(entry.sequence);
        }
        Ok(max_sequence + 1)
    }

    /// The WAL file path.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// The next sequence number to be assigned.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Append a batch as one atomic frame and fsync.
    ///
    /// Returns the assigned sequence number.
    pub fn append(&mut self, ops: Vec<WalOp>) -> WalResult<u64> {
        let sequence = self.next_sequence;
        let entry = WalEntry::new(sequence, ops);
        let payload = entry.to_bytes();
        let checksum = compute_checksum(&payload);

        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&payload);

        self.file
            .write_all(&frame)
            .map_err(|e| WalError::append_failed("failed to append WAL frame", e))?;
        self.file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("failed to fsync WAL", e))?;

        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Flush outstanding writes to disk.
    pub fn fsync(&mut self) -> WalResult<()> {
        self.file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("failed to fsync WAL", e))
    }

    /// Truncate the log to zero after a checkpoint made it redundant.
    ///
    /// Sequence numbering continues; numbers are never reused.
    pub fn truncate(&mut self) -> WalResult<()> {
        self.file
            .set_len(0)
            .map_err(|e| WalError::truncate_failed("failed to truncate WAL", e))?;
        self.file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("failed to fsync WAL after truncate", e))?;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> WalResult<u64> {
        fs::metadata(&self.wal_path)
            .map(|m| m.len())
            .map_err(|e| WalError::append_failed("failed to stat WAL", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn put(key: &str) -> WalOp {
        WalOp::Put {
            key: key.to_string(),
            body: json!({"k": key}),
        }
    }

    #[test]
    fn sequences_start_at_one_and_climb() {
        let dir = TempDir::new().unwrap();
        let mut writer = WalWriter::open(dir.path()).unwrap();
        assert_eq!(writer.append(vec![put("a")]).unwrap(), 1);
        assert_eq!(writer.append(vec![put("b")]).unwrap(), 2);
    }

    #[test]
    fn reopen_continues_numbering() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = WalWriter::open(dir.path()).unwrap();
            writer.append(vec![put("a")]).unwrap();
            writer.append(vec![put("b")]).unwrap();
        }
        let writer = WalWriter::open(dir.path()).unwrap();
        assert_eq!(writer.next_sequence(), 3);
    }

    #[test]
    fn truncate_empties_file_but_keeps_numbering() {
        let dir = TempDir::new().unwrap();
        let mut writer = WalWriter::open(dir.path()).unwrap();
        writer.append(vec![put("a")]).unwrap();
        writer.truncate().unwrap();
        assert_eq!(writer.size().unwrap(), 0);
        assert_eq!(writer.append(vec![put("b")]).unwrap(), 2);
    }
}
