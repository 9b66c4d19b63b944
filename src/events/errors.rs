//! Event bus error types

use std::fmt;

use crate::error::{EngineError, ErrorCode};

/// Event bus failures.
#[derive(Debug, Clone)]
pub struct EventError {
    message: String,
}

impl EventError {
    /// Listener registry is full.
    pub fn limit_exceeded(max: usize) -> Self {
        Self {
            message: format!("listener registry is full ({} listeners)", max),
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[LIMIT_EXCEEDED] {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl From<EventError> for EngineError {
    fn from(err: EventError) -> Self {
        EngineError::new(ErrorCode::LimitExceeded, "events.subscribe", err.message)
    }
}

/// Result type for event bus operations.
pub type EventResult<T> = Result<T, EventError>;
