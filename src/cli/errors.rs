//! CLI error types

use thiserror::Error;

use crate::error::EngineError;

/// CLI failures.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("integrity check found {0} issues")]
    IntegrityFailed(usize),
}

impl CliError {
    /// Stable code for the error envelope.
    pub fn code_str(&self) -> &'static str {
        match self {
            CliError::Engine(e) => e.code.as_str(),
            CliError::Config(_) => "CONFIG_ERROR",
            CliError::IntegrityFailed(_) => "STORAGE_CORRUPT",
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
