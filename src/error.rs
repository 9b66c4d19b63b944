//! Crate-wide error taxonomy
//!
//! Every fallible operation in atlas resolves to one of the codes below.
//! Subsystems carry their own error types and convert into [`EngineError`]
//! at the coordinator boundary, so callers always observe a closed set of
//! codes with stable severity and retriability.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Closed set of error codes surfaced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation
    InvalidPath,
    InvalidValue,
    TypeError,
    MissingField,
    FormatError,
    LimitExceeded,

    // Relationship
    InvalidReference,
    CircularDependency,
    HierarchyDepthExceeded,
    DuplicateSibling,
    DependencyDepthExceeded,

    // State machine
    InvalidTransition,
    DependencyNotReady,
    ChildrenNotCompleted,

    // Concurrency
    TransactionAlreadyActive,
    NoActiveTransaction,
    RollbackFailed,
    Timeout,
    PoolExhausted,

    // Storage
    StorageIo,
    StorageCorrupt,
    StorageInit,

    // System
    InternalError,
    NotFound,
    Duplicate,
    PermissionDenied,
    RateLimited,
}

/// Severity derived from the code, used for log levels and degradation
/// decisions. `STORAGE_*` failures are the only critical class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorCode {
    /// Stable string form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::TypeError => "TYPE_ERROR",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::FormatError => "FORMAT_ERROR",
            ErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
            ErrorCode::InvalidReference => "INVALID_REFERENCE",
            ErrorCode::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorCode::HierarchyDepthExceeded => "HIERARCHY_DEPTH_EXCEEDED",
            ErrorCode::DuplicateSibling => "DUPLICATE_SIBLING",
            ErrorCode::DependencyDepthExceeded => "DEPENDENCY_DEPTH_EXCEEDED",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::DependencyNotReady => "DEPENDENCY_NOT_READY",
            ErrorCode::ChildrenNotCompleted => "CHILDREN_NOT_COMPLETED",
            ErrorCode::TransactionAlreadyActive => "TRANSACTION_ALREADY_ACTIVE",
            ErrorCode::NoActiveTransaction => "NO_ACTIVE_TRANSACTION",
            ErrorCode::RollbackFailed => "ROLLBACK_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::PoolExhausted => "POOL_EXHAUSTED",
            ErrorCode::StorageIo => "STORAGE_IO",
            ErrorCode::StorageCorrupt => "STORAGE_CORRUPT",
            ErrorCode::StorageInit => "STORAGE_INIT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Duplicate => "DUPLICATE",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::RateLimited => "RATE_LIMITED",
        }
    }

    /// Severity ladder for the code.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::StorageIo | ErrorCode::StorageCorrupt | ErrorCode::StorageInit => {
                Severity::Critical
            }
            ErrorCode::RollbackFailed | ErrorCode::InternalError => Severity::High,
            ErrorCode::CircularDependency
            | ErrorCode::InvalidReference
            | ErrorCode::InvalidTransition
            | ErrorCode::TransactionAlreadyActive
            | ErrorCode::NoActiveTransaction
            | ErrorCode::Timeout
            | ErrorCode::PoolExhausted => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Whether a caller may retry the failed operation without risking
    /// duplicate effects. Transactions are idempotent by id, so transient
    /// storage and contention failures retry safely.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Timeout
                | ErrorCode::PoolExhausted
                | ErrorCode::RateLimited
                | ErrorCode::StorageIo
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error envelope carried across the engine boundary.
///
/// Every error records the operation it arose from and a creation
/// timestamp so that surfaced failures are self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineError {
    /// Taxonomy code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Operation name that produced the error
    pub operation: String,
    /// RFC3339 creation timestamp
    pub timestamp: String,
    /// Optional structured details (failing paths, indexes, offsets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl EngineError {
    /// Create a new error for the given operation.
    pub fn new(code: ErrorCode, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            operation: operation.into(),
            timestamp: Utc::now().to_rfc3339(),
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Severity derived from the code.
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Whether the caller may safely retry.
    pub fn is_retriable(&self) -> bool {
        self.code.is_retriable()
    }

    /// Shorthand for a NOT_FOUND error.
    pub fn not_found(operation: impl Into<String>, what: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, operation, format!("not found: {}", what))
    }

    /// Shorthand for an INTERNAL_ERROR.
    pub fn internal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, operation, message)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (op: {})",
            self.severity(),
            self.code,
            self.message,
            self.operation
        )?;
        if let Some(ref details) = self.details {
            write!(f, " {}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

/// Result type for engine-boundary operations.
pub type EngineResult<T> = Result<T, EngineError>;
