//! Snapshot subsystem
//!
//! A snapshot is a compact, self-verifying image of the whole store taken
//! at a checkpoint. On-disk layout of `snapshot.bin`:
//!
//! - line 1: JSON header `{magic, version, created_at, record_count, checksum}`
//! - lines 2..: one JSON record per line, sorted by key
//!
//! The checksum is a CRC32 over the records section, so the header can be
//! validated before any record is trusted. Snapshots are written to a
//! temporary file, fsynced, then renamed into place; a crash mid-write
//! never damages the previous snapshot.

mod errors;
mod header;
mod reader;
mod writer;

pub use errors::{SnapshotError, SnapshotErrorCode, SnapshotResult};
pub use header::{SnapshotHeader, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;

/// Snapshot file name under the store directory.
pub const SNAPSHOT_FILE: &str = "snapshot.bin";
