//! Backup manifest and file format
//!
//! A backup is one JSON document: `{manifest, records}`. The manifest
//! carries the schema version, per-kind record counts, and a SHA-256
//! hash per record, so integrity is checkable without the live store.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::StoreRecord;

use super::errors::{BackupError, BackupResult};

/// Current backup schema version.
pub const BACKUP_SCHEMA_VERSION: u32 = 1;

/// The manifest section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub schema_version: u32,
    /// RFC3339 creation timestamp
    pub created_at: String,
    pub record_count: u64,
    /// Records per entity kind (key namespace)
    pub counts: BTreeMap<String, u64>,
    /// key → SHA-256 hex of the canonical body bytes
    pub hashes: BTreeMap<String, String>,
}

impl BackupManifest {
    /// Build a manifest over a record set.
    pub fn over(records: &[StoreRecord]) -> Self {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut hashes = BTreeMap::new();
        for record in records {
            let kind = record
                .key
                .split(':')
                .next()
                .unwrap_or("unknown")
                .to_string();
            *counts.entry(kind).or_insert(0) += 1;
            hashes.insert(record.key.clone(), record_hash(record));
        }
        Self {
            schema_version: BACKUP_SCHEMA_VERSION,
            created_at: Utc::now().to_rfc3339(),
            record_count: records.len() as u64,
            counts,
            hashes,
        }
    }

    /// Verify a record set against this manifest. Every mismatch is
    /// collected.
    pub fn verify(&self, records: &[StoreRecord]) -> BackupResult<()> {
        if self.schema_version != BACKUP_SCHEMA_VERSION {
            return Err(BackupError::corrupt(format!(
                "unsupported backup schema version: {}",
                self.schema_version
            )));
        }
        if self.record_count != records.len() as u64 {
            return Err(BackupError::corrupt(format!(
                "record count mismatch: manifest says {}, found {}",
                self.record_count,
                records.len()
            )));
        }
        let mut mismatches = Vec::new();
        for record in records {
            match self.hashes.get(&record.key) {
                Some(expected) if *expected == record_hash(record) => {}
                Some(_) => mismatches.push(format!("{}: hash mismatch", record.key)),
                None => mismatches.push(format!("{}: missing from manifest", record.key)),
            }
        }
        if !mismatches.is_empty() {
            return Err(BackupError::corrupt(format!(
                "{} records failed verification: {}",
                mismatches.len(),
                mismatches.join("; ")
            )));
        }
        Ok(())
    }
}

/// The whole backup document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub manifest: BackupManifest,
    pub records: Vec<StoreRecord>,
}

impl BackupFile {
    /// Parse and verify a backup document.
    pub fn parse(raw: &str) -> BackupResult<Self> {
        let file: BackupFile = serde_json::from_str(raw)
            .map_err(|e| BackupError::corrupt(format!("malformed backup file: {}", e)))?;
        file.manifest.verify(&file.records)?;
        for record in &file.records {
            if !record.verify_checksum() {
                return Err(BackupError::corrupt(format!(
                    "record checksum mismatch: {}",
                    record.key
                )));
            }
        }
        Ok(file)
    }
}

/// SHA-256 hex of a record's canonical body bytes.
pub fn record_hash(record: &StoreRecord) -> String {
    let bytes = serde_json::to_vec(&record.body).expect("Value serialization cannot fail");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<StoreRecord> {
        vec![
            StoreRecord::new("task:proj/a".to_string(), json!({"name": "a"})),
            StoreRecord::new("project:proj".to_string(), json!({"name": "p"})),
        ]
    }

    #[test]
    fn manifest_counts_by_kind() {
        let manifest = BackupManifest::over(&records());
        assert_eq!(manifest.record_count, 2);
        assert_eq!(manifest.counts["task"], 1);
        assert_eq!(manifest.counts["project"], 1);
    }

    #[test]
    fn verify_passes_for_untouched_records() {
        let records = records();
        let manifest = BackupManifest::over(&records);
        assert!(manifest.verify(&records).is_ok());
    }

    #[test]
    fn tampered_record_fails_verification() {
        let mut records = records();
        let manifest = BackupManifest::over(&records);
        records[0] = StoreRecord::new("task:proj/a".to_string(), json!({"name": "tampered"}));
        assert!(manifest.verify(&records).is_err());
    }

    #[test]
    fn file_round_trips_through_json() {
        let records = records();
        let file = BackupFile {
            manifest: BackupManifest::over(&records),
            records,
        };
        let raw = serde_json::to_string(&file).unwrap();
        let parsed = BackupFile::parse(&raw).unwrap();
        assert_eq!(parsed.manifest, file.manifest);
    }
}
