//! Dependency index
//!
//! Outgoing edges per source path, plus the inbound inverse (target →
//! sources). Both maps are ordered so iteration is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DependencyEdge, DependencyKind};

use super::errors::{IndexError, IndexErrorCode, IndexResult};
use super::IndexStats;

/// Edge storage keyed by task path.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    /// source path → outgoing edges, ordered by target
    outgoing: BTreeMap<String, BTreeMap<String, DependencyEdge>>,
    /// target path → inbound source paths
    inbound: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge.
    ///
    /// # Errors
    ///
    /// `DUPLICATE` when an edge source→target already exists.
    pub fn add(&mut self, edge: DependencyEdge) -> IndexResult<()> {
        let targets = self.outgoing.entry(edge.source.clone()).or_default();
        if targets.contains_key(&edge.target) {
            return Err(IndexError::new(
                IndexErrorCode::Duplicate,
                "dependency",
                edge.source.clone(),
                format!("edge to {} already exists", edge.target),
            ));
        }
        self.inbound
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.source.clone());
        targets.insert(edge.target.clone(), edge);
        Ok(())
    }

    /// Remove an edge.
    pub fn remove(&mut self, source: &str, target: &str) -> IndexResult<DependencyEdge> {
        let edge = self
            .outgoing
            .get_mut(source)
            .and_then(|targets| targets.remove(target))
            .ok_or_else(|| {
                IndexError::new(
                    IndexErrorCode::NotFound,
                    "dependency",
                    source,
                    format!("no edge to {}", target),
                )
            })?;
        if let Some(targets) = self.outgoing.get(source) {
            if targets.is_empty() {
                self.outgoing.remove(source);
            }
        }
        if let Some(sources) = self.inbound.get_mut(target) {
            sources.remove(source);
            if sources.is_empty() {
                self.inbound.remove(target);
            }
        }
        Ok(edge)
    }

    /// Remove every edge touching a path, outgoing and inbound.
    /// Returns the removed edges.
    pub fn remove_all_for(&mut self, path: &str) -> Vec<DependencyEdge> {
        let mut removed = Vec::new();
        if let Some(targets) = self.outgoing.remove(path) {
            for (target, edge) in targets {
                if let Some(sources) = self.inbound.get_mut(&target) {
                    sources.remove(path);
                    if sources.is_empty() {
                        self.inbound.remove(&target);
                    }
                }
                removed.push(edge);
            }
        }
        if let Some(sources) = self.inbound.remove(path) {
            for source in sources {
                if let Some(targets) = self.outgoing.get_mut(&source) {
                    if let Some(edge) = targets.remove(path) {
                        removed.push(edge);
                    }
                    if targets.is_empty() {
                        self.outgoing.remove(&source);
                    }
                }
            }
        }
        removed
    }

    /// Replace the outgoing edge set of a source from a task's
    /// dependency list, preserving kinds of retained edges. New targets
    /// get `requires` edges.
    pub fn sync_outgoing(&mut self, source: &str, targets: &BTreeSet<String>) {
        let existing: Vec<String> = self
            .outgoing
            .get(source)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        for gone in existing.iter().filter(|t| !targets.contains(*t)) {
            let _ = self.remove(source, gone);
        }
        for target in targets {
            if !self.has_edge(source, target) {
                let _ = self.add(DependencyEdge::new(
                    source.to_string(),
                    target.clone(),
                    DependencyKind::Requires,
                ));
            }
        }
    }

    /// Whether an edge exists.
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.outgoing
            .get(source)
            .map(|t| t.contains_key(target))
            .unwrap_or(false)
    }

    /// Outgoing edges of a source, ordered by target.
    pub fn edges_from(&self, source: &str) -> Vec<&DependencyEdge> {
        self.outgoing
            .get(source)
            .map(|t| t.values().collect())
            .unwrap_or_default()
    }

    /// Inbound source paths of a target, ordered.
    pub fn dependents_of(&self, target: &str) -> Vec<String> {
        self.inbound
            .get(target)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All source paths with outgoing edges, ordered.
    pub fn sources(&self) -> Vec<String> {
        self.outgoing.keys().cloned().collect()
    }

    /// Outgoing target paths of a source, ordered.
    pub fn targets_of(&self, source: &str) -> Vec<String> {
        self.outgoing
            .get(source)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.outgoing.clear();
        self.inbound.clear();
    }

    /// Total edge count.
    pub fn len(&self) -> usize {
        self.outgoing.values().map(|t| t.len()).sum()
    }

    /// Whether the index holds no edges.
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// Index counters.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str) -> DependencyEdge {
        DependencyEdge::new(source, target, DependencyKind::Requires)
    }

    #[test]
    fn add_maintains_both_directions() {
        let mut index = DependencyIndex::new();
        index.add(edge("proj/b", "proj/a")).unwrap();
        assert!(index.has_edge("proj/b", "proj/a"));
        assert_eq!(index.dependents_of("proj/a"), vec!["proj/b"]);
        assert_eq!(index.targets_of("proj/b"), vec!["proj/a"]);
    }

    #[test]
    fn duplicate_edge_rejected() {
        let mut index = DependencyIndex::new();
        index.add(edge("proj/b", "proj/a")).unwrap();
        let err = index.add(edge("proj/b", "proj/a")).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::Duplicate);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_all_cleans_inverse() {
        let mut index = DependencyIndex::new();
        index.add(edge("proj/b", "proj/a")).unwrap();
        index.add(edge("proj/c", "proj/a")).unwrap();
        index.add(edge("proj/a", "proj/z")).unwrap();
        let removed = index.remove_all_for("proj/a");
        assert_eq!(removed.len(), 3);
        assert!(index.is_empty());
        assert!(index.dependents_of("proj/a").is_empty());
        assert!(index.dependents_of("proj/z").is_empty());
    }

    #[test]
    fn sync_outgoing_preserves_kinds() {
        let mut index = DependencyIndex::new();
        let mut special = edge("proj/b", "proj/a");
        special.kind = DependencyKind::Extends;
        index.add(special).unwrap();

        let targets: BTreeSet<String> =
            ["proj/a".to_string(), "proj/c".to_string()].into_iter().collect();
        index.sync_outgoing("proj/b", &targets);

        let edges = index.edges_from("proj/b");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].kind, DependencyKind::Extends);
        assert_eq!(edges[1].kind, DependencyKind::Requires);
    }
}
