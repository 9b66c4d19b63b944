//! Hierarchical path identity
//!
//! A task path is a slash-separated identifier rooted at a project path.
//! Each segment matches `[A-Za-z][A-Za-z0-9_-]{0,49}`; depth is bounded at
//! 7 segments and the whole path at 255 bytes. Parsing is the single entry
//! point: a constructed [`TaskPath`] is always valid.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};

/// Maximum number of segments in a path.
pub const MAX_DEPTH: usize = 7;

/// Maximum total path length in bytes.
pub const MAX_BYTES: usize = 255;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,49}$").expect("valid pattern"))
}

/// A validated hierarchical path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskPath {
    raw: String,
}

impl TaskPath {
    /// Parse and validate a path.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_PATH` when the path is empty, exceeds the byte or
    /// depth bound, contains an empty segment, or a segment fails the
    /// grammar.
    pub fn parse(raw: impl AsRef<str>) -> ModelResult<Self> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(ModelError::invalid_path("path is empty"));
        }
        if raw.len() > MAX_BYTES {
            return Err(ModelError::invalid_path(format!(
                "path is {} bytes, limit {}",
                raw.len(),
                MAX_BYTES
            )));
        }
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() > MAX_DEPTH {
            return Err(ModelError::invalid_path(format!(
                "path has {} segments, limit {}",
                segments.len(),
                MAX_DEPTH
            )));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(ModelError::invalid_path("empty path segment"));
            }
            if !segment_pattern().is_match(segment) {
                return Err(ModelError::invalid_path(format!(
                    "invalid path segment: {}",
                    segment
                )));
            }
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// The raw path string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path segments in order.
    pub fn segments(&self) -> Vec<&str> {
        self.raw.split('/').collect()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.raw.split('/').count()
    }

    /// The parent path, or None at the root.
    pub fn parent(&self) -> Option<TaskPath> {
        self.raw.rfind('/').map(|idx| TaskPath {
            raw: self.raw[..idx].to_string(),
        })
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        self.raw.rsplit('/').next().unwrap_or(&self.raw)
    }

    /// The first segment, the project root of the path.
    pub fn root(&self) -> &str {
        self.raw.split('/').next().unwrap_or(&self.raw)
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &TaskPath) -> bool {
        other.raw.len() > self.raw.len()
            && other.raw.starts_with(&self.raw)
            && other.raw.as_bytes()[self.raw.len()] == b'/'
    }

    /// Whether `other` is an immediate child of `self`.
    pub fn is_parent_of(&self, other: &TaskPath) -> bool {
        match other.parent() {
            Some(parent) => parent == *self,
            None => false,
        }
    }

    /// Append a segment, revalidating the result.
    pub fn child(&self, segment: &str) -> ModelResult<TaskPath> {
        TaskPath::parse(format!("{}/{}", self.raw, segment))
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<String> for TaskPath {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaskPath::parse(value)
    }
}

impl From<TaskPath> for String {
    fn from(path: TaskPath) -> String {
        path.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_paths() {
        let path = TaskPath::parse("proj/phase-1/task_a").unwrap();
        assert_eq!(path.depth(), 3);
        assert_eq!(path.leaf(), "task_a");
        assert_eq!(path.root(), "proj");
        assert_eq!(path.parent().unwrap().as_str(), "proj/phase-1");
    }

    #[test]
    fn rejects_empty_and_empty_segments() {
        assert!(TaskPath::parse("").is_err());
        assert!(TaskPath::parse("a//b").is_err());
        assert!(TaskPath::parse("/a").is_err());
        assert!(TaskPath::parse("a/").is_err());
    }

    #[test]
    fn rejects_bad_segment_grammar() {
        assert!(TaskPath::parse("1task").is_err());
        assert!(TaskPath::parse("proj/-x").is_err());
        assert!(TaskPath::parse("proj/has space").is_err());
        assert!(TaskPath::parse("proj/ok.dot").is_err());
    }

    #[test]
    fn segment_length_bound_is_50() {
        let ok = format!("a{}", "b".repeat(49));
        assert!(TaskPath::parse(&ok).is_ok());
        let too_long = format!("a{}", "b".repeat(50));
        assert!(TaskPath::parse(&too_long).is_err());
    }

    #[test]
    fn depth_boundary_is_seven() {
        let seven = (0..7).map(|i| format!("s{}", i)).collect::<Vec<_>>().join("/");
        assert!(TaskPath::parse(&seven).is_ok());
        let eight = (0..8).map(|i| format!("s{}", i)).collect::<Vec<_>>().join("/");
        assert!(TaskPath::parse(&eight).is_err());
    }

    #[test]
    fn total_byte_bound_is_255() {
        // 6 segments of 41 chars plus separators lands just under the cap
        let seg = "a".repeat(41);
        let path = (0..6).map(|_| seg.clone()).collect::<Vec<_>>().join("/");
        assert!(path.len() <= 255);
        assert!(TaskPath::parse(&path).is_ok());
        let long_seg = format!("a{}", "b".repeat(49));
        let over: String = (0..6)
            .map(|_| long_seg.clone())
            .collect::<Vec<_>>()
            .join("/");
        assert!(over.len() > 255);
        assert!(TaskPath::parse(&over).is_err());
    }

    #[test]
    fn ancestry_checks() {
        let root = TaskPath::parse("proj").unwrap();
        let mid = TaskPath::parse("proj/a").unwrap();
        let leaf = TaskPath::parse("proj/a/b").unwrap();
        assert!(root.is_ancestor_of(&leaf));
        assert!(mid.is_parent_of(&leaf));
        assert!(!root.is_parent_of(&leaf));
        // Prefix without a separator boundary is not ancestry
        let sibling = TaskPath::parse("proj-other").unwrap();
        assert!(!root.is_ancestor_of(&sibling));
    }

    #[test]
    fn serde_round_trip_validates() {
        let path: TaskPath = serde_json::from_str("\"proj/a\"").unwrap();
        assert_eq!(path.as_str(), "proj/a");
        assert!(serde_json::from_str::<TaskPath>("\"bad//path\"").is_err());
    }
}
