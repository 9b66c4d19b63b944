//! WAL entry types
//!
//! One entry per committed batch. Single writes are one-op batches, so
//! replay has exactly one shape to handle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single operation inside a WAL entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WalOp {
    /// Full-record write (insert or replace)
    Put { key: String, body: Value },
    /// Record removal
    Delete { key: String },
}

impl WalOp {
    /// The store key this op touches.
    pub fn key(&self) -> &str {
        match self {
            WalOp::Put { key, .. } => key,
            WalOp::Delete { key } => key,
        }
    }
}

/// One durable WAL entry: a sequence number and an atomic batch of ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonic sequence number, starts at 1, never reused
    pub sequence: u64,
    /// The batch, applied in order during replay
    pub ops: Vec<WalOp>,
}

impl WalEntry {
    /// Create an entry.
    pub fn new(sequence: u64, ops: Vec<WalOp>) -> Self {
        Self { sequence, ops }
    }

    /// Serialize to the frame payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("WalEntry serialization cannot fail")
    }

    /// Deserialize from a frame payload.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_round_trips() {
        let entry = WalEntry::new(
            7,
            vec![
                WalOp::Put {
                    key: "task:proj/a".to_string(),
                    body: json!({"name": "a"}),
                },
                WalOp::Delete {
                    key: "task:proj/b".to_string(),
                },
            ],
        );
        let bytes = entry.to_bytes();
        let decoded = WalEntry::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn malformed_payload_is_none() {
        assert!(WalEntry::from_bytes(b"{not json").is_none());
    }
}
