//! Snapshot header

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::errors::{SnapshotError, SnapshotResult};

/// Magic string identifying an atlas snapshot.
pub const SNAPSHOT_MAGIC: &str = "ATLS";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Header line of `snapshot.bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: String,
    pub version: u32,
    /// RFC3339 creation timestamp
    pub created_at: String,
    pub record_count: u64,
    /// CRC32 over the records section
    pub checksum: u32,
}

impl SnapshotHeader {
    /// Create a header stamped now.
    pub fn new(record_count: u64, checksum: u32) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC.to_string(),
            version: SNAPSHOT_VERSION,
            created_at: Utc::now().to_rfc3339(),
            record_count,
            checksum,
        }
    }

    /// Parse and verify the identity fields of a header line.
    pub fn parse(line: &str) -> SnapshotResult<Self> {
        let header: SnapshotHeader = serde_json::from_str(line)
            .map_err(|e| SnapshotError::corruption(format!("malformed snapshot header: {}", e)))?;
        if header.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::corruption(format!(
                "bad snapshot magic: {}",
                header.magic
            )));
        }
        if header.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::corruption(format!(
                "unsupported snapshot version: {}",
                header.version
            )));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = SnapshotHeader::new(42, 0xdead_beef);
        let line = serde_json::to_string(&header).unwrap();
        let parsed = SnapshotHeader::parse(&line).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut header = SnapshotHeader::new(0, 0);
        header.magic = "XXXX".to_string();
        let line = serde_json::to_string(&header).unwrap();
        assert!(SnapshotHeader::parse(&line).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut header = SnapshotHeader::new(0, 0);
        header.version = 99;
        let line = serde_json::to_string(&header).unwrap();
        assert!(SnapshotHeader::parse(&line).is_err());
    }
}
