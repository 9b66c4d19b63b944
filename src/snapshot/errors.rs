//! Snapshot error types

use std::fmt;
use std::io;

use crate::error::{EngineError, ErrorCode};

/// Snapshot error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotErrorCode {
    /// Write or rename failed
    WriteFailed,
    /// Open or read failed
    ReadFailed,
    /// Header or records failed verification
    Corruption,
}

impl SnapshotErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotErrorCode::WriteFailed => "SNAPSHOT_WRITE_FAILED",
            SnapshotErrorCode::ReadFailed => "SNAPSHOT_READ_FAILED",
            SnapshotErrorCode::Corruption => "SNAPSHOT_CORRUPTION",
        }
    }
}

impl fmt::Display for SnapshotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A snapshot failure with context.
#[derive(Debug)]
pub struct SnapshotError {
    code: SnapshotErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl SnapshotError {
    /// Write failure.
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::WriteFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Read failure.
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::ReadFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Corruption detected.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::Corruption,
            message: message.into(),
            source: None,
        }
    }

    /// The error code.
    pub fn code(&self) -> SnapshotErrorCode {
        self.code
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<SnapshotError> for EngineError {
    fn from(err: SnapshotError) -> Self {
        let code = match err.code {
            SnapshotErrorCode::Corruption => ErrorCode::StorageCorrupt,
            _ => ErrorCode::StorageIo,
        };
        EngineError::new(code, "snapshot", err.to_string())
    }
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;
