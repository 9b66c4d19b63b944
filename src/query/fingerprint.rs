//! Query fingerprints
//!
//! The canonical cache key for a parameterised read: a SHA-256 digest
//! over the statement name and the canonicalised parameter value.
//! Canonicalisation sorts object keys recursively so two logically equal
//! parameter sets always produce the same fingerprint.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical string form of a JSON value with sorted object keys.
pub fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).expect("key serializes"),
                        canonicalize(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", rendered.join(","))
        }
        other => serde_json::to_string(other).expect("scalar serializes"),
    }
}

/// Fingerprint a statement + params pair.
pub fn fingerprint(statement: &str, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(statement.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonicalize(params).as_bytes());
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

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(fingerprint("get", &a), fingerprint("get", &b));
    }

    #[test]
    fn statement_distinguishes() {
        let params = json!({"key": "task:proj/a"});
        assert_ne!(fingerprint("get", &params), fingerprint("range", &params));
    }

    #[test]
    fn params_distinguish() {
        assert_ne!(
            fingerprint("get", &json!({"key": "a"})),
            fingerprint("get", &json!({"key": "b"}))
        );
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(
            fingerprint("get", &json!([1, 2])),
            fingerprint("get", &json!([2, 1]))
        );
    }
}
