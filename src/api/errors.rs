//! Request surface error types

use thiserror::Error;

use crate::error::{EngineError, ErrorCode};

/// Failures raised before an operation reaches the engine.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("bulk mode requires 1-100 items, got {0}")]
    BadBulkSize(usize),
    #[error("operation does not support bulk mode")]
    BulkUnsupported,
}

impl From<ApiError> for EngineError {
    fn from(err: ApiError) -> Self {
        let code = match &err {
            ApiError::Malformed(_) => ErrorCode::FormatError,
            ApiError::BadBulkSize(_) => ErrorCode::LimitExceeded,
            ApiError::BulkUnsupported => ErrorCode::InvalidValue,
        };
        EngineError::new(code, "request", err.to_string())
    }
}
