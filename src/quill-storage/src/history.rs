//! Linear undo/redo history of outline snapshots.
//!
//! The history is never empty and the cursor always points at a snapshot.
//! Appending after an undo discards everything past the cursor, so the redo
//! path is lost once a new edit is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Refused history moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    CannotUndo,
    #[error("Nothing to redo")]
    CannotRedo,
}

/// Outline snapshots with a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineHistory {
    #[serde(rename = "outlineHistory")]
    snapshots: Vec<String>,
    #[serde(rename = "currentHistoryIndex")]
    cursor: usize,
}

impl Default for OutlineHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineHistory {
    /// A history seeded with a single empty snapshot.
    pub fn new() -> Self {
        Self::with_initial(String::new())
    }

    /// A history seeded with `outline`.
    pub fn with_initial(outline: impl Into<String>) -> Self {
        Self {
            snapshots: vec![outline.into()],
            cursor: 0,
        }
    }

    /// Rebuild from stored parts, restoring the invariants: an empty
    /// sequence is seeded with `""` and the cursor is clamped into range.
    pub fn from_parts(snapshots: Vec<String>, cursor: usize) -> Self {
        if snapshots.is_empty() {
            return Self::new();
        }
        let cursor = cursor.min(snapshots.len() - 1);
        Self { snapshots, cursor }
    }

    /// Record a new snapshot and move the cursor onto it. Returns the new
    /// cursor.
    pub fn append(&mut self, outline: impl Into<String>) -> usize {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(outline.into());
        self.cursor = self.snapshots.len() - 1;
        self.cursor
    }

    /// Step back one snapshot.
    pub fn undo(&mut self) -> Result<&str, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::CannotUndo);
        }
        self.cursor -= 1;
        Ok(self.current())
    }

    /// Step forward one snapshot.
    pub fn redo(&mut self) -> Result<&str, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::CannotRedo);
        }
        self.cursor += 1;
        Ok(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// The snapshot under the cursor.
    pub fn current(&self) -> &str {
        &self.snapshots[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn abc() -> OutlineHistory {
        let mut history = OutlineHistory::with_initial("A");
        history.append("B");
        history.append("C");
        history
    }

    #[test]
    fn test_new_is_seeded() {
        let history = OutlineHistory::new();
        assert_eq!(history.snapshots(), [""]);
        assert_eq!(history.cursor(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_append_after_undo_discards_redo_path() {
        let mut history = abc();
        assert_eq!(history.undo().unwrap(), "B");
        assert_eq!(history.cursor(), 1);

        assert_eq!(history.append("D"), 2);
        assert_eq!(history.snapshots(), ["A", "B", "D"]);
        assert_eq!(history.redo(), Err(HistoryError::CannotRedo));
        assert_eq!(history.current(), "D");
    }

    #[test]
    fn test_undo_at_start_is_noop() {
        let mut history = abc();
        history.undo().unwrap();
        history.undo().unwrap();
        let before = history.clone();

        assert_eq!(history.undo(), Err(HistoryError::CannotUndo));
        assert_eq!(history, before);
    }

    #[test]
    fn test_redo_at_end_is_noop() {
        let mut history = abc();
        let before = history.clone();

        assert_eq!(history.redo(), Err(HistoryError::CannotRedo));
        assert_eq!(history, before);
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut history = abc();
        assert_eq!(history.undo().unwrap(), "B");
        assert_eq!(history.undo().unwrap(), "A");
        assert_eq!(history.redo().unwrap(), "B");
        assert_eq!(history.redo().unwrap(), "C");
    }

    #[test]
    fn test_from_parts_repairs() {
        assert_eq!(OutlineHistory::from_parts(vec![], 4), OutlineHistory::new());

        let history = OutlineHistory::from_parts(vec!["A".into(), "B".into()], 9);
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.current(), "B");
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(abc()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"outlineHistory": ["A", "B", "C"], "currentHistoryIndex": 2})
        );
    }
}
