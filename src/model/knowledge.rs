//! Knowledge item entity

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};
use super::id::generate_id;
use super::path::TaskPath;

/// A knowledge item attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    /// Project this item belongs to
    pub project_path: TaskPath,
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl KnowledgeItem {
    /// Create a new knowledge item.
    pub fn new(project_path: TaskPath, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            project_path,
            text: text.into(),
            tags: BTreeSet::new(),
            domain: None,
            citations: Vec::new(),
            created: now,
            updated: now,
        }
    }

    /// Stamp a mutation.
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }

    /// Validate value-local rules.
    pub fn validate(&self) -> ModelResult<()> {
        if self.text.trim().is_empty() {
            return Err(ModelError::missing_field("text"));
        }
        if self.project_path.depth() != 1 {
            return Err(ModelError::invalid_path(
                "knowledge project_path must be a project root",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_rejected() {
        let mut item = KnowledgeItem::new(TaskPath::parse("proj").unwrap(), "useful fact");
        assert!(item.validate().is_ok());
        item.text = "  ".to_string();
        assert!(item.validate().is_err());
    }
}
