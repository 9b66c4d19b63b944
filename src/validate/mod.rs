//! Dependency validator
//!
//! Ensures dependency edges are well-formed at insert and on status
//! changes: every target exists, no edge closes a cycle, chains stay
//! within the depth bound, and readiness holds for the transitions that
//! demand it.
//!
//! Results are collected, not short-circuited: the report lists every
//! failing edge so the coordinator can surface all of them at once.

mod errors;

pub use errors::{ValidationIssue, ValidationReport};

use std::collections::{BTreeSet, HashSet};

use crate::index::IndexSet;
use crate::model::{Task, TaskStatus};

/// Validator over the index image.
pub struct DependencyValidator<'a> {
    indexes: &'a IndexSet,
    max_depth: usize,
}

impl<'a> DependencyValidator<'a> {
    /// Create a validator with a chain depth bound.
    pub fn new(indexes: &'a IndexSet, max_depth: usize) -> Self {
        Self { indexes, max_depth }
    }

    /// Validate one proposed edge `source → target`.
    pub fn validate_edge(&self, source: &str, target: &str) -> ValidationReport {
        let mut report = ValidationReport::default();
        if source == target {
            report.push(ValidationIssue::SelfReference {
                path: source.to_string(),
            });
            return report;
        }
        if !self.indexes.primary.contains_path(target) {
            report.push(ValidationIssue::MissingTarget {
                source: source.to_string(),
                target: target.to_string(),
            });
        }
        if !self.indexes.primary.contains_path(source) {
            report.push(ValidationIssue::MissingTarget {
                source: target.to_string(),
                target: source.to_string(),
            });
        }
        if report.valid {
            self.check_cycle(source, target, &mut report);
        }
        report
    }

    /// Validate a task's whole dependency set, as on create or update.
    pub fn validate_task(&self, task: &Task) -> ValidationReport {
        let mut report = ValidationReport::default();
        for target in &task.dependencies {
            if target == task.path.as_str() {
                report.push(ValidationIssue::SelfReference {
                    path: target.clone(),
                });
                continue;
            }
            if !self.indexes.primary.contains_path(target) {
                report.push(ValidationIssue::MissingTarget {
                    source: task.path.as_str().to_string(),
                    target: target.clone(),
                });
            }
        }
        if report.valid {
            for target in &task.dependencies {
                self.check_cycle(task.path.as_str(), target, &mut report);
                if !report.valid {
                    break;
                }
            }
        }
        report
    }

    /// Readiness for a requested transition: blocking dependencies are
    /// the not-COMPLETED targets; status conflicts are targets that can
    /// never complete (CANCELLED).
    pub fn check_readiness(&self, task: &Task, requested: TaskStatus) -> ValidationReport {
        let mut report = ValidationReport::default();
        if !matches!(requested, TaskStatus::InProgress | TaskStatus::Completed) {
            return report;
        }
        for target in &task.dependencies {
            match self.indexes.primary.get_by_path(target) {
                Some(dep) if dep.status == TaskStatus::Completed => {}
                Some(dep) if dep.status == TaskStatus::Cancelled => {
                    report.status_conflicts.push(target.clone());
                    report.blocking_dependencies.push(target.clone());
                    report.valid = false;
                }
                Some(_) => {
                    report.blocking_dependencies.push(target.clone());
                    report.valid = false;
                }
                None => {
                    report.push(ValidationIssue::MissingTarget {
                        source: task.path.as_str().to_string(),
                        target: target.clone(),
                    });
                }
            }
        }
        report
    }

    /// DFS from `target` along existing edges looking for `source`.
    /// Finding it means the proposed edge closes a loop. The walk is
    /// bounded by the configured depth.
    fn check_cycle(&self, source: &str, target: &str, report: &mut ValidationReport) {
        let mut stack: Vec<(String, usize)> = vec![(target.to_string(), 1)];
        let mut visited: HashSet<String> = HashSet::new();
        let mut trail: BTreeSet<String> = BTreeSet::new();

        while let Some((current, depth)) = stack.pop() {
            if depth > self.max_depth {
                report.push(ValidationIssue::DepthExceeded {
                    depth,
                    limit: self.max_depth,
                });
                return;
            }
            if current == source {
                let mut cycle: Vec<String> = trail.iter().cloned().collect();
                cycle.push(source.to_string());
                report.push(ValidationIssue::Cycle { members: cycle });
                return;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            trail.insert(current.clone());
            for next in self.indexes.dependency.targets_of(&current) {
                stack.push((next, depth + 1));
            }
        }
    }
}
