//! State machine error types

use std::fmt;

use crate::error::{EngineError, ErrorCode};
use crate::model::TaskStatus;

/// State machine error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusErrorCode {
    /// The edge is not in the transition table
    InvalidTransition,
    /// A dependency is not COMPLETED
    DependencyNotReady,
    /// A milestone child is not COMPLETED
    ChildrenNotCompleted,
    /// The task does not exist
    NotFound,
}

impl StatusErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusErrorCode::InvalidTransition => "INVALID_TRANSITION",
            StatusErrorCode::DependencyNotReady => "DEPENDENCY_NOT_READY",
            StatusErrorCode::ChildrenNotCompleted => "CHILDREN_NOT_COMPLETED",
            StatusErrorCode::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for StatusErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rejected transition, with the paths that caused the rejection.
#[derive(Debug, Clone)]
pub struct StatusError {
    code: StatusErrorCode,
    message: String,
    /// Dependency or child paths behind the rejection
    offenders: Vec<String>,
}

impl StatusError {
    /// Edge not in the table.
    pub fn invalid_transition(from: TaskStatus, to: TaskStatus) -> Self {
        Self {
            code: StatusErrorCode::InvalidTransition,
            message: format!("transition {} -> {} disallowed", from.as_str(), to.as_str()),
            offenders: Vec::new(),
        }
    }

    /// Dependencies not ready.
    pub fn dependency_not_ready(blocking: Vec<String>) -> Self {
        Self {
            code: StatusErrorCode::DependencyNotReady,
            message: format!("{} dependencies not COMPLETED", blocking.len()),
            offenders: blocking,
        }
    }

    /// Milestone children not complete.
    pub fn children_not_completed(children: Vec<String>) -> Self {
        Self {
            code: StatusErrorCode::ChildrenNotCompleted,
            message: format!("{} children not COMPLETED", children.len()),
            offenders: children,
        }
    }

    /// Missing task.
    pub fn not_found(path: &str) -> Self {
        Self {
            code: StatusErrorCode::NotFound,
            message: format!("task not found: {}", path),
            offenders: Vec::new(),
        }
    }

    /// The code.
    pub fn code(&self) -> StatusErrorCode {
        self.code
    }

    /// The offending paths.
    pub fn offenders(&self) -> &[String] {
        &self.offenders
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.offenders.is_empty() {
            write!(f, " [{}]", self.offenders.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for StatusError {}

impl From<StatusError> for EngineError {
    fn from(err: StatusError) -> Self {
        let code = match err.code {
            StatusErrorCode::InvalidTransition => ErrorCode::InvalidTransition,
            StatusErrorCode::DependencyNotReady => ErrorCode::DependencyNotReady,
            StatusErrorCode::ChildrenNotCompleted => ErrorCode::ChildrenNotCompleted,
            StatusErrorCode::NotFound => ErrorCode::NotFound,
        };
        EngineError::new(code, "status.transition", err.message.clone())
            .with_details(serde_json::json!({ "offenders": err.offenders }))
    }
}

/// Result type for state machine operations.
pub type StatusResult<T> = Result<T, StatusError>;
