//! Backup error types

use std::fmt;
use std::io;

use crate::error::{EngineError, ErrorCode};

/// Backup error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupErrorCode {
    /// Export write failed
    ExportFailed,
    /// Import read or apply failed
    ImportFailed,
    /// Backup file failed verification
    Corrupt,
}

impl BackupErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupErrorCode::ExportFailed => "BACKUP_EXPORT_FAILED",
            BackupErrorCode::ImportFailed => "BACKUP_IMPORT_FAILED",
            BackupErrorCode::Corrupt => "BACKUP_CORRUPT",
        }
    }
}

impl fmt::Display for BackupErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A backup failure with context.
#[derive(Debug)]
pub struct BackupError {
    code: BackupErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl BackupError {
    /// Export failure.
    pub fn export_failed(message: impl Into<String>) -> Self {
        Self {
            code: BackupErrorCode::ExportFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Export failure with an IO cause.
    pub fn export_io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: BackupErrorCode::ExportFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Import failure.
    pub fn import_failed(message: impl Into<String>) -> Self {
        Self {
            code: BackupErrorCode::ImportFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Verification failure.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            code: BackupErrorCode::Corrupt,
            message: message.into(),
            source: None,
        }
    }

    /// The code.
    pub fn code(&self) -> BackupErrorCode {
        self.code
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<BackupError> for EngineError {
    fn from(err: BackupError) -> Self {
        let code = match err.code {
            BackupErrorCode::Corrupt => ErrorCode::StorageCorrupt,
            _ => ErrorCode::StorageIo,
        };
        EngineError::new(code, "backup", err.to_string())
    }
}

/// Result type for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;
