//! Task note categories
//!
//! Four ordered note sequences per task. Each category is bounded in note
//! count and each note in byte length; bounds come from the configured
//! limits and are enforced on append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};

/// The four note categories carried by every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    Planning,
    Progress,
    Completion,
    Troubleshooting,
}

impl NoteCategory {
    /// All categories, in stable order.
    pub const ALL: [NoteCategory; 4] = [
        NoteCategory::Planning,
        NoteCategory::Progress,
        NoteCategory::Completion,
        NoteCategory::Troubleshooting,
    ];

    /// Category name for error fields and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteCategory::Planning => "planning",
            NoteCategory::Progress => "progress",
            NoteCategory::Completion => "completion",
            NoteCategory::Troubleshooting => "troubleshooting",
        }
    }
}

/// A single note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    pub created: DateTime<Utc>,
}

impl Note {
    /// Create a note stamped now.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created: Utc::now(),
        }
    }
}

/// The per-task note board holding all four categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteBoard {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planning: Vec<Note>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<Note>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completion: Vec<Note>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub troubleshooting: Vec<Note>,
}

impl NoteBoard {
    /// The notes of one category.
    pub fn category(&self, category: NoteCategory) -> &[Note] {
        match category {
            NoteCategory::Planning => &self.planning,
            NoteCategory::Progress => &self.progress,
            NoteCategory::Completion => &self.completion,
            NoteCategory::Troubleshooting => &self.troubleshooting,
        }
    }

    fn category_mut(&mut self, category: NoteCategory) -> &mut Vec<Note> {
        match category {
            NoteCategory::Planning => &mut self.planning,
            NoteCategory::Progress => &mut self.progress,
            NoteCategory::Completion => &mut self.completion,
            NoteCategory::Troubleshooting => &mut self.troubleshooting,
        }
    }

    /// Append a note to a category, enforcing both bounds.
    ///
    /// # Errors
    ///
    /// `LIMIT_EXCEEDED` when the category is at `max_notes` or the note
    /// text exceeds `max_note_bytes`.
    pub fn append(
        &mut self,
        category: NoteCategory,
        note: Note,
        max_notes: usize,
        max_note_bytes: usize,
    ) -> ModelResult<()> {
        if note.text.len() > max_note_bytes {
            return Err(ModelError::limit_exceeded(
                format!("notes.{}", category.as_str()),
                format!(
                    "note is {} bytes, limit {}",
                    note.text.len(),
                    max_note_bytes
                ),
            ));
        }
        let notes = self.category_mut(category);
        if notes.len() >= max_notes {
            return Err(ModelError::limit_exceeded(
                format!("notes.{}", category.as_str()),
                format!("category holds {} notes, limit {}", notes.len(), max_notes),
            ));
        }
        notes.push(note);
        Ok(())
    }

    /// Validate an already-populated board against the bounds.
    pub fn validate(&self, max_notes: usize, max_note_bytes: usize) -> ModelResult<()> {
        for category in NoteCategory::ALL {
            let notes = self.category(category);
            if notes.len() > max_notes {
                return Err(ModelError::limit_exceeded(
                    format!("notes.{}", category.as_str()),
                    format!("category holds {} notes, limit {}", notes.len(), max_notes),
                ));
            }
            for note in notes {
                if note.text.len() > max_note_bytes {
                    return Err(ModelError::limit_exceeded(
                        format!("notes.{}", category.as_str()),
                        format!("note is {} bytes, limit {}", note.text.len(), max_note_bytes),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Total notes across all categories.
    pub fn total(&self) -> usize {
        NoteCategory::ALL
            .iter()
            .map(|c| self.category(*c).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_at_bound_accepted_past_bound_rejected() {
        let mut board = NoteBoard::default();
        for i in 0..3 {
            board
                .append(NoteCategory::Planning, Note::new(format!("n{}", i)), 3, 64)
                .unwrap();
        }
        let err = board
            .append(NoteCategory::Planning, Note::new("overflow"), 3, 64)
            .unwrap_err();
        assert_eq!(err.code().as_str(), "LIMIT_EXCEEDED");
        // Other categories are unaffected by the planning bound
        board
            .append(NoteCategory::Progress, Note::new("ok"), 3, 64)
            .unwrap();
    }

    #[test]
    fn oversized_note_rejected() {
        let mut board = NoteBoard::default();
        let err = board
            .append(NoteCategory::Completion, Note::new("x".repeat(65)), 3, 64)
            .unwrap_err();
        assert_eq!(err.code().as_str(), "LIMIT_EXCEEDED");
        assert_eq!(board.total(), 0);
    }
}
