//! Write-ahead log subsystem
//!
//! The WAL is the authoritative durability mechanism. No acknowledged
//! write exists unless it is fully persisted in the log.
//!
//! Frame layout, in order on disk:
//! - payload length (u32 LE)
//! - payload checksum (u32 LE, CRC32)
//! - payload (serialized [`WalEntry`])
//!
//! An entry carries a whole batch, so multi-record writes are atomic by
//! construction: either the frame is fully on disk and verifiable, or the
//! tail is truncated to the last verifiable frame at recovery.
//!
//! Invariants enforced:
//! - fsync before acknowledgment
//! - sequential deterministic replay
//! - checksums on every frame
//! - a corrupt tail is truncated, never silently skipped over

mod checksum;
mod errors;
mod reader;
mod record;
mod writer;

pub use checksum::compute_checksum;
pub use errors::{WalError, WalErrorCode, WalResult};
pub use reader::{TailReport, WalReader};
pub use record::{WalEntry, WalOp};
pub use writer::WalWriter;

/// WAL file name under the store directory.
pub const WAL_FILE: &str = "wal.log";
