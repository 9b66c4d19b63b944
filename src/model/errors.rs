//! Model validation error types
//!
//! Errors raised while validating a single entity value, before any state
//! is mutated. Each carries a code from the validation family plus the
//! failing field for reporting.

use std::fmt;

use crate::error::{EngineError, ErrorCode};

/// Validation error codes for the model layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorCode {
    /// Path grammar, depth, or byte-length violation
    InvalidPath,
    /// A value outside its allowed domain
    InvalidValue,
    /// A field with the wrong type
    TypeError,
    /// A required field absent
    MissingField,
    /// A malformed composite (timestamps, urls, citations)
    FormatError,
    /// A count or byte bound exceeded
    LimitExceeded,
}

impl ModelErrorCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelErrorCode::InvalidPath => "INVALID_PATH",
            ModelErrorCode::InvalidValue => "INVALID_VALUE",
            ModelErrorCode::TypeError => "TYPE_ERROR",
            ModelErrorCode::MissingField => "MISSING_FIELD",
            ModelErrorCode::FormatError => "FORMAT_ERROR",
            ModelErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
        }
    }

    fn taxonomy(&self) -> ErrorCode {
        match self {
            ModelErrorCode::InvalidPath => ErrorCode::InvalidPath,
            ModelErrorCode::InvalidValue => ErrorCode::InvalidValue,
            ModelErrorCode::TypeError => ErrorCode::TypeError,
            ModelErrorCode::MissingField => ErrorCode::MissingField,
            ModelErrorCode::FormatError => ErrorCode::FormatError,
            ModelErrorCode::LimitExceeded => ErrorCode::LimitExceeded,
        }
    }
}

impl fmt::Display for ModelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A model validation failure.
#[derive(Debug, Clone)]
pub struct ModelError {
    code: ModelErrorCode,
    /// Field or path segment the error refers to
    field: String,
    message: String,
}

impl ModelError {
    /// Create a new model error.
    pub fn new(
        code: ModelErrorCode,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Invalid path shorthand.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::new(ModelErrorCode::InvalidPath, "path", message)
    }

    /// Limit exceeded shorthand.
    pub fn limit_exceeded(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ModelErrorCode::LimitExceeded, field, message)
    }

    /// Missing field shorthand.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("required field is missing: {}", field);
        Self::new(ModelErrorCode::MissingField, field, message)
    }

    /// The error code.
    pub fn code(&self) -> ModelErrorCode {
        self.code
    }

    /// The failing field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.field, self.message)
    }
}

impl std::error::Error for ModelError {}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        EngineError::new(err.code.taxonomy(), "validate", err.message.clone()).with_details(
            serde_json::json!({ "field": err.field }),
        )
    }
}

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_into_engine_error() {
        let err = ModelError::invalid_path("segment starts with a digit");
        let engine: EngineError = err.into();
        assert_eq!(engine.code, ErrorCode::InvalidPath);
        assert!(engine.details.is_some());
    }

    #[test]
    fn display_names_field() {
        let err = ModelError::limit_exceeded("notes.planning", "26 notes, limit 25");
        let rendered = err.to_string();
        assert!(rendered.contains("LIMIT_EXCEEDED"));
        assert!(rendered.contains("notes.planning"));
    }
}
