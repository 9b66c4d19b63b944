//! Validation report types

use std::fmt;

use crate::error::{EngineError, ErrorCode};

/// One well-formedness failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// An edge endpoint does not resolve
    MissingTarget { source: String, target: String },
    /// The proposed edge closes a loop through these members
    Cycle { members: Vec<String> },
    /// The dependency chain exceeds the configured depth
    DepthExceeded { depth: usize, limit: usize },
    /// A task referencing itself
    SelfReference { path: String },
}

impl ValidationIssue {
    /// The taxonomy code for this issue.
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationIssue::MissingTarget { .. } => ErrorCode::InvalidReference,
            ValidationIssue::Cycle { .. } => ErrorCode::CircularDependency,
            ValidationIssue::DepthExceeded { .. } => ErrorCode::DependencyDepthExceeded,
            ValidationIssue::SelfReference { .. } => ErrorCode::CircularDependency,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingTarget { source, target } => {
                write!(f, "edge {} -> {}: target does not exist", source, target)
            }
            ValidationIssue::Cycle { members } => {
                write!(f, "cycle through [{}]", members.join(", "))
            }
            ValidationIssue::DepthExceeded { depth, limit } => {
                write!(f, "dependency chain depth {} exceeds limit {}", depth, limit)
            }
            ValidationIssue::SelfReference { path } => {
                write!(f, "{} references itself", path)
            }
        }
    }
}

/// Collected validation outcome.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    /// Not-COMPLETED dependency targets found by the readiness check
    pub blocking_dependencies: Vec<String>,
    /// Targets that can never complete (CANCELLED)
    pub status_conflicts: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            blocking_dependencies: Vec::new(),
            status_conflicts: Vec::new(),
        }
    }
}

impl ValidationReport {
    /// Record an issue and mark the report invalid.
    pub fn push(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Convert the first issue into an engine error; the full report
    /// rides in the details.
    pub fn into_engine_error(self, operation: &str) -> EngineError {
        let code = self
            .errors
            .first()
            .map(|i| i.code())
            .unwrap_or(ErrorCode::DependencyNotReady);
        let messages: Vec<String> = self.errors.iter().map(|i| i.to_string()).collect();
        EngineError::new(
            code,
            operation,
            messages
                .first()
                .cloned()
                .unwrap_or_else(|| "dependencies not ready".to_string()),
        )
        .with_details(serde_json::json!({
            "errors": messages,
            "blocking_dependencies": self.blocking_dependencies,
            "status_conflicts": self.status_conflicts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_invalidates() {
        let mut report = ValidationReport::default();
        assert!(report.valid);
        report.push(ValidationIssue::SelfReference {
            path: "proj/a".to_string(),
        });
        assert!(!report.valid);
    }

    #[test]
    fn engine_error_takes_first_issue_code() {
        let mut report = ValidationReport::default();
        report.push(ValidationIssue::Cycle {
            members: vec!["proj/a".to_string(), "proj/b".to_string()],
        });
        let err = report.into_engine_error("dependency.add");
        assert_eq!(err.code, ErrorCode::CircularDependency);
    }
}
