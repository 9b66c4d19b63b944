//! WAL error types
//!
//! Append and fsync failures keep the process alive but fail the write;
//! corruption anywhere except the truncatable tail is unrecoverable.

use std::fmt;
use std::io;

use crate::error::{EngineError, ErrorCode};

/// WAL error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// Append or open failed
    AppendFailed,
    /// fsync failed after an append
    FsyncFailed,
    /// Checksum or framing failure
    Corruption,
    /// Truncation during checkpoint failed
    TruncateFailed,
}

impl WalErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            WalErrorCode::AppendFailed => "WAL_APPEND_FAILED",
            WalErrorCode::FsyncFailed => "WAL_FSYNC_FAILED",
            WalErrorCode::Corruption => "WAL_CORRUPTION",
            WalErrorCode::TruncateFailed => "WAL_TRUNCATE_FAILED",
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A WAL failure with context.
#[derive(Debug)]
pub struct WalError {
    code: WalErrorCode,
    message: String,
    /// Optional byte offset or sequence context
    details: Option<String>,
    source: Option<io::Error>,
}

impl WalError {
    /// Append failure.
    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: WalErrorCode::AppendFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// fsync failure.
    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: WalErrorCode::FsyncFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Corruption detected.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: WalErrorCode::Corruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Corruption with a byte offset.
    pub fn corruption_at(offset: u64, message: impl Into<String>) -> Self {
        Self {
            code: WalErrorCode::Corruption,
            message: message.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    /// Truncation failure.
    pub fn truncate_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: WalErrorCode::TruncateFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// The error code.
    pub fn code(&self) -> WalErrorCode {
        self.code
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<WalError> for EngineError {
    fn from(err: WalError) -> Self {
        let code = match err.code {
            WalErrorCode::Corruption => ErrorCode::StorageCorrupt,
            _ => ErrorCode::StorageIo,
        };
        EngineError::new(code, "wal", err.to_string())
    }
}

/// Result type for WAL operations.
pub type WalResult<T> = Result<T, WalError>;
