//! Dependency edge value type

use serde::{Deserialize, Serialize};

/// Relationship kind carried by a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Requires,
    Extends,
    Implements,
    References,
}

impl DependencyKind {
    /// Kind name for errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Requires => "requires",
            DependencyKind::Extends => "extends",
            DependencyKind::Implements => "implements",
            DependencyKind::References => "references",
        }
    }
}

/// A directed dependency edge between two task paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Source task path (the dependent)
    pub source: String,
    /// Target task path (the dependency)
    pub target: String,
    pub kind: DependencyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DependencyEdge {
    /// Create an edge.
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&DependencyKind::Requires).unwrap(),
            "\"requires\""
        );
    }
}
