//! Pool error types

use std::fmt;
use std::time::Duration;

use crate::error::{EngineError, ErrorCode};

/// Pool failures surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No handle became available before the deadline
    Timeout { waited: Duration },
    /// The wait queue is full; the caller failed immediately
    Exhausted { waiting: usize },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Timeout { waited } => {
                write!(f, "[TIMEOUT] no handle within {:?}", waited)
            }
            PoolError::Exhausted { waiting } => {
                write!(f, "[POOL_EXHAUSTED] wait queue full ({} waiting)", waiting)
            }
        }
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for EngineError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout { .. } => {
                EngineError::new(ErrorCode::Timeout, "pool.acquire", err.to_string())
            }
            PoolError::Exhausted { .. } => {
                EngineError::new(ErrorCode::PoolExhausted, "pool.acquire", err.to_string())
            }
        }
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
