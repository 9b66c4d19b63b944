//! Durable store error types

use std::fmt;
use std::io;

use crate::error::{EngineError, ErrorCode};
use crate::snapshot::SnapshotError;
use crate::wal::WalError;

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Filesystem failure on read or write
    Io,
    /// Checksum or structural verification failure
    Corrupt,
    /// The store could not be opened
    Init,
    /// Writes rejected until an integrity check passes
    Degraded,
    /// Key not present
    NotFound,
}

impl StoreErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorCode::Io => "STORAGE_IO",
            StoreErrorCode::Corrupt => "STORAGE_CORRUPT",
            StoreErrorCode::Init => "STORAGE_INIT",
            StoreErrorCode::Degraded => "STORAGE_DEGRADED",
            StoreErrorCode::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A store failure with context.
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// IO failure.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StoreErrorCode::Io,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Corruption.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::Corrupt,
            message: message.into(),
            source: None,
        }
    }

    /// Open failure.
    pub fn init(message: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::Init,
            message: message.into(),
            source: None,
        }
    }

    /// Degraded-mode rejection.
    pub fn degraded() -> Self {
        Self {
            code: StoreErrorCode::Degraded,
            message: "store is degraded; writes rejected until integrity check passes".to_string(),
            source: None,
        }
    }

    /// Missing key.
    pub fn not_found(key: &str) -> Self {
        Self {
            code: StoreErrorCode::NotFound,
            message: format!("no record for key: {}", key),
            source: None,
        }
    }

    /// The error code.
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<WalError> for StoreError {
    fn from(err: WalError) -> Self {
        let code = match err.code() {
            crate::wal::WalErrorCode::Corruption => StoreErrorCode::Corrupt,
            _ => StoreErrorCode::Io,
        };
        Self {
            code,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<SnapshotError> for StoreError {
    fn from(err: SnapshotError) -> Self {
        let code = match err.code() {
            crate::snapshot::SnapshotErrorCode::Corruption => StoreErrorCode::Corrupt,
            _ => StoreErrorCode::Io,
        };
        Self {
            code,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        let code = match err.code {
            StoreErrorCode::Corrupt => ErrorCode::StorageCorrupt,
            StoreErrorCode::Init => ErrorCode::StorageInit,
            StoreErrorCode::NotFound => ErrorCode::NotFound,
            _ => ErrorCode::StorageIo,
        };
        EngineError::new(code, "store", err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
