//! Store record
//!
//! The unit the durable store persists: a namespaced key, the entity
//! body, and a checksum over the canonical body bytes. The checksum is
//! computed once at write time and re-verified by the integrity check.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wal::compute_checksum;

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub key: String,
    pub body: Value,
    /// CRC32 over the canonical JSON bytes of `body`
    pub checksum: u32,
}

impl StoreRecord {
    /// Create a record, computing its checksum.
    pub fn new(key: String, body: Value) -> Self {
        let checksum = Self::body_checksum(&body);
        Self {
            key,
            body,
            checksum,
        }
    }

    /// Recompute and compare the body checksum.
    pub fn verify_checksum(&self) -> bool {
        Self::body_checksum(&self.body) == self.checksum
    }

    fn body_checksum(body: &Value) -> u32 {
        let bytes = serde_json::to_vec(body).expect("Value serialization cannot fail");
        compute_checksum(&bytes)
    }
}
