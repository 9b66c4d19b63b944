//! Durable store
//!
//! Canonical persistence for all entities: an append-only WAL plus a
//! periodically-compacted snapshot. The in-memory record map is the
//! working image; every mutation is WAL-durable before it is applied to
//! the map, and a checkpoint folds the log into a fresh snapshot.
//!
//! Open sequence:
//! 1. Load and verify `snapshot.bin` (if present)
//! 2. Replay `wal.log` entries in order
//! 3. Truncate a torn or corrupt tail to the last verifiable frame,
//!    reporting the event
//!
//! Batches are atomic: one WAL frame per batch, all records applied
//! together or none. Storage corruption marks the store degraded; writes
//! are rejected until an integrity check passes.

mod engine;
mod errors;
mod record;
mod recovery;
mod verifier;

pub use engine::{StoreBatch, StoreStats, TaskStore};
pub use errors::{StoreError, StoreErrorCode, StoreResult};
pub use record::StoreRecord;
pub use recovery::RecoveryReport;
pub use verifier::{IntegrityIssue, IntegrityReport};
