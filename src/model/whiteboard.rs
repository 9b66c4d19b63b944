//! Whiteboard entity with versioned history
//!
//! A whiteboard is a named JSON document. Every update appends a version;
//! history is bounded and the oldest versions are evicted first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};

/// Versions kept per whiteboard.
pub const MAX_VERSIONS: usize = 20;

/// One stored whiteboard version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardVersion {
    pub version: u64,
    pub data: serde_json::Value,
    pub created: DateTime<Utc>,
}

/// A named whiteboard with bounded version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Whiteboard {
    pub name: String,
    /// Versions in ascending order; the last entry is current
    pub versions: Vec<WhiteboardVersion>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Whiteboard {
    /// Create a whiteboard with an initial version.
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> ModelResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::missing_field("name"));
        }
        let now = Utc::now();
        Ok(Self {
            name,
            versions: vec![WhiteboardVersion {
                version: 1,
                data,
                created: now,
            }],
            created: now,
            updated: now,
        })
    }

    /// Append a new version, evicting the oldest beyond [`MAX_VERSIONS`].
    pub fn put(&mut self, data: serde_json::Value) -> u64 {
        let next = self.current_version() + 1;
        let now = Utc::now();
        self.versions.push(WhiteboardVersion {
            version: next,
            data,
            created: now,
        });
        while self.versions.len() > MAX_VERSIONS {
            self.versions.remove(0);
        }
        self.updated = now;
        next
    }

    /// The current version number.
    pub fn current_version(&self) -> u64 {
        self.versions.last().map(|v| v.version).unwrap_or(0)
    }

    /// Fetch a version; `None` selects the current one.
    pub fn get(&self, version: Option<u64>) -> Option<&WhiteboardVersion> {
        match version {
            Some(v) => self.versions.iter().find(|entry| entry.version == v),
            None => self.versions.last(),
        }
    }
}
