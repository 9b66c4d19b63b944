//! Response envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Per-item outcome for bulk operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// The envelope every operation returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_results: Option<Vec<OperationResult>>,
}

impl Response {
    /// Success with data.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            operation_results: None,
        }
    }

    /// Success without data.
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            operation_results: None,
        }
    }

    /// Failure from an engine error. Bulk item errors in the details
    /// become per-item operation results.
    pub fn fail(error: EngineError) -> Self {
        let operation_results = error
            .details
            .as_ref()
            .and_then(|d| d.get("item_errors"))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| OperationResult {
                        index: item.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                        success: false,
                        error: Some(item.clone()),
                    })
                    .collect()
            });
        Self {
            success: false,
            data: None,
            error: Some(error),
            operation_results,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Response serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn item_errors_become_operation_results() {
        let error = EngineError::new(ErrorCode::InvalidReference, "task.create", "missing parent")
            .with_details(json!({
                "item_errors": [
                    {"index": 2, "code": "INVALID_REFERENCE", "message": "missing parent"}
                ]
            }));
        let response = Response::fail(error);
        assert!(!response.success);
        let results = response.operation_results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 2);
    }

    #[test]
    fn envelope_skips_absent_fields() {
        let rendered = Response::ok(json!({"n": 1})).to_json();
        assert!(!rendered.contains("error"));
        assert!(!rendered.contains("operation_results"));
    }
}
