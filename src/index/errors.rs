//! Index error types

use std::fmt;

use crate::error::{EngineError, ErrorCode};

/// Index error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// A value the index cannot accept (e.g. a disallowed transition)
    InvalidValue,
    /// Insert would duplicate a unique key
    Duplicate,
    /// Id or path not present
    NotFound,
    /// Insert or update would create a hierarchy cycle
    CycleDetected,
    /// Hierarchy depth bound exceeded
    DepthExceeded,
    /// Parent/child kind combination not allowed
    InvalidContainment,
    /// Children count bound exceeded
    LimitExceeded,
}

impl IndexErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexErrorCode::InvalidValue => "INVALID_VALUE",
            IndexErrorCode::Duplicate => "DUPLICATE",
            IndexErrorCode::NotFound => "NOT_FOUND",
            IndexErrorCode::CycleDetected => "CIRCULAR_DEPENDENCY",
            IndexErrorCode::DepthExceeded => "HIERARCHY_DEPTH_EXCEEDED",
            IndexErrorCode::InvalidContainment => "TYPE_ERROR",
            IndexErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An index failure naming the index and the offending key.
#[derive(Debug, Clone)]
pub struct IndexError {
    code: IndexErrorCode,
    index: &'static str,
    key: String,
    message: String,
}

impl IndexError {
    /// Create an index error.
    pub fn new(
        code: IndexErrorCode,
        index: &'static str,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            index,
            key: key.into(),
            message: message.into(),
        }
    }

    /// The code.
    pub fn code(&self) -> IndexErrorCode {
        self.code
    }

    /// The index that rejected the operation.
    pub fn index(&self) -> &'static str {
        self.index
    }

    /// The offending key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} index, key {}: {}",
            self.code, self.index, self.key, self.message
        )
    }
}

impl std::error::Error for IndexError {}

impl From<IndexError> for EngineError {
    fn from(err: IndexError) -> Self {
        let code = match err.code {
            IndexErrorCode::InvalidValue => ErrorCode::InvalidValue,
            IndexErrorCode::Duplicate => ErrorCode::Duplicate,
            IndexErrorCode::NotFound => ErrorCode::NotFound,
            IndexErrorCode::CycleDetected => ErrorCode::CircularDependency,
            IndexErrorCode::DepthExceeded => ErrorCode::HierarchyDepthExceeded,
            IndexErrorCode::InvalidContainment => ErrorCode::TypeError,
            IndexErrorCode::LimitExceeded => ErrorCode::LimitExceeded,
        };
        EngineError::new(code, format!("index.{}", err.index), err.message.clone())
            .with_details(serde_json::json!({ "key": err.key }))
    }
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
