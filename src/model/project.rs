//! Project entity
//!
//! Containment root for a tree of tasks. A project owns the set of
//! top-level task paths rooted at its path.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};
use super::path::TaskPath;

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Archived,
}

/// A titled URL attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUrl {
    pub title: String,
    pub url: String,
}

/// A project record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Single-segment root path
    pub path: TaskPath,
    pub name: String,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<ProjectUrl>,
    /// Top-level task paths owned by this project
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tasks: BTreeSet<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Project {
    /// Create a new ACTIVE project rooted at a single-segment path.
    ///
    /// # Errors
    ///
    /// `INVALID_PATH` when the path has more than one segment.
    pub fn new(path: TaskPath, name: impl Into<String>) -> ModelResult<Self> {
        if path.depth() != 1 {
            return Err(ModelError::invalid_path(format!(
                "project path must be a single segment: {}",
                path.as_str()
            )));
        }
        let now = Utc::now();
        Ok(Self {
            path,
            name: name.into(),
            status: ProjectStatus::Active,
            urls: Vec::new(),
            tasks: BTreeSet::new(),
            created: now,
            updated: now,
        })
    }

    /// Stamp a mutation.
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }

    /// Validate value-local rules.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::missing_field("name"));
        }
        if self.path.depth() != 1 {
            return Err(ModelError::invalid_path(
                "project path must be a single segment",
            ));
        }
        for url in &self.urls {
            if url.url.trim().is_empty() {
                return Err(ModelError::missing_field("urls.url"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_path_must_be_root() {
        assert!(Project::new(TaskPath::parse("proj").unwrap(), "p").is_ok());
        assert!(Project::new(TaskPath::parse("proj/nested").unwrap(), "p").is_err());
    }

    #[test]
    fn new_project_is_active() {
        let p = Project::new(TaskPath::parse("proj").unwrap(), "p").unwrap();
        assert_eq!(p.status, ProjectStatus::Active);
        assert!(p.tasks.is_empty());
    }
}
