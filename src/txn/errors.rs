//! Transaction error types

use std::fmt;

use crate::error::{EngineError, ErrorCode};

/// Transaction lifecycle failures.
#[derive(Debug, Clone)]
pub enum TxnError {
    /// begin() while a transaction is active
    AlreadyActive { active_id: String },
    /// commit()/rollback() without an active transaction
    NoActiveTransaction,
    /// Rollback compensation failed; carries the original failure text
    RollbackFailed {
        original: String,
        failure: String,
    },
}

impl fmt::Display for TxnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnError::AlreadyActive { active_id } => {
                write!(f, "[TRANSACTION_ALREADY_ACTIVE] transaction {} is active", active_id)
            }
            TxnError::NoActiveTransaction => {
                write!(f, "[NO_ACTIVE_TRANSACTION] no transaction is active")
            }
            TxnError::RollbackFailed { original, failure } => {
                write!(
                    f,
                    "[ROLLBACK_FAILED] {} (original error: {})",
                    failure, original
                )
            }
        }
    }
}

impl std::error::Error for TxnError {}

impl From<TxnError> for EngineError {
    fn from(err: TxnError) -> Self {
        match &err {
            TxnError::AlreadyActive { .. } => {
                EngineError::new(ErrorCode::TransactionAlreadyActive, "txn.begin", err.to_string())
            }
            TxnError::NoActiveTransaction => {
                EngineError::new(ErrorCode::NoActiveTransaction, "txn.commit", err.to_string())
            }
            TxnError::RollbackFailed { original, .. } => {
                EngineError::new(ErrorCode::RollbackFailed, "txn.rollback", err.to_string())
                    .with_details(serde_json::json!({ "original": original }))
            }
        }
    }
}
