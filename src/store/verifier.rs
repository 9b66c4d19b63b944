//! Store integrity check
//!
//! Verifies every record's checksum and the referential sanity of
//! parent_path and dependency references against the primary table only.
//! The report lists every issue found, not just the first.

use std::collections::BTreeMap;

use serde_json::Value;

use super::record::StoreRecord;

/// One integrity finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// Record body does not match its stored checksum
    ChecksumMismatch { key: String },
    /// A task's parent_path resolves to neither a task nor a project
    DanglingParent { key: String, parent: String },
    /// A dependency target does not resolve to a task
    DanglingDependency { key: String, target: String },
    /// Record body is not an object with the expected fields
    MalformedBody { key: String, reason: String },
}

/// Full integrity report.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub records_checked: u64,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// Whether the store passed.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every record.
pub fn verify(records: &BTreeMap<String, StoreRecord>) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    for (key, record) in records {
        report.records_checked += 1;

        if !record.verify_checksum() {
            report.issues.push(IntegrityIssue::ChecksumMismatch {
                key: key.clone(),
            });
            continue;
        }

        if let Some(path) = key.strip_prefix("task:") {
            check_task_references(records, key, path, &record.body, &mut report);
        }
    }

    report
}

fn check_task_references(
    records: &BTreeMap<String, StoreRecord>,
    key: &str,
    _path: &str,
    body: &Value,
    report: &mut IntegrityReport,
) {
    let obj = match body.as_object() {
        Some(obj) => obj,
        None => {
            report.issues.push(IntegrityIssue::MalformedBody {
                key: key.to_string(),
                reason: "task body is not an object".to_string(),
            });
            return;
        }
    };

    if let Some(parent) = obj.get("parent_path").and_then(|v| v.as_str()) {
        let as_task = format!("task:{}", parent);
        let as_project = format!("project:{}", parent);
        if !records.contains_key(&as_task) && !records.contains_key(&as_project) {
            report.issues.push(IntegrityIssue::DanglingParent {
                key: key.to_string(),
                parent: parent.to_string(),
            });
        }
    }

    if let Some(deps) = obj.get("dependencies").and_then(|v| v.as_array()) {
        for dep in deps {
            if let Some(target) = dep.as_str() {
                if !records.contains_key(&format!("task:{}", target)) {
                    report.issues.push(IntegrityIssue::DanglingDependency {
                        key: key.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records_from(pairs: Vec<(&str, Value)>) -> BTreeMap<String, StoreRecord> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), StoreRecord::new(k.to_string(), v)))
            .collect()
    }

    #[test]
    fn clean_store_is_clean() {
        let records = records_from(vec![
            ("project:proj", json!({"name": "p"})),
            (
                "task:proj/a",
                json!({"parent_path": "proj", "dependencies": []}),
            ),
            (
                "task:proj/b",
                json!({"parent_path": "proj", "dependencies": ["proj/a"]}),
            ),
        ]);
        let report = verify(&records);
        assert!(report.is_clean());
        assert_eq!(report.records_checked, 3);
    }

    #[test]
    fn dangling_parent_and_dependency_both_reported() {
        let records = records_from(vec![
            (
                "task:proj/a",
                json!({"parent_path": "ghost", "dependencies": ["missing/x"]}),
            ),
        ]);
        let report = verify(&records);
        assert_eq!(report.issues.len(), 2);
        assert!(matches!(
            report.issues[0],
            IntegrityIssue::DanglingParent { .. }
        ));
        assert!(matches!(
            report.issues[1],
            IntegrityIssue::DanglingDependency { .. }
        ));
    }

    #[test]
    fn checksum_mismatch_reported() {
        let mut records = records_from(vec![("task:proj/a", json!({"name": "a"}))]);
        records.get_mut("task:proj/a").unwrap().body = json!({"name": "tampered"});
        let report = verify(&records);
        assert!(!report.is_clean());
        assert!(matches!(
            report.issues[0],
            IntegrityIssue::ChecksumMismatch { .. }
        ));
    }
}
