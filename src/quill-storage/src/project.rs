//! Projects and their chat transcripts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{HistoryError, OutlineHistory};

/// Title given to new and cleared projects.
pub const UNTITLED: &str = "Untitled Document";

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "ai")]
    Assistant,
}

/// One chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub message: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            message: message.into(),
            timestamp: now_millis(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(Sender::User, message)
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, message)
    }
}

/// One document with its chat and edit history.
///
/// `outline` always equals the history snapshot under the cursor; all
/// outline changes go through the methods below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredProject")]
pub struct Project {
    pub id: String,
    pub title: String,
    outline: String,
    pub chat_history: Vec<ChatMessage>,
    #[serde(flatten)]
    history: OutlineHistory,
    pub custom_instructions: String,
    /// Unix milliseconds.
    pub last_modified: i64,
}

/// Stored form of a project; older entries may lack any of the
/// history-related fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProject {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    outline: Option<String>,
    #[serde(default)]
    chat_history: Option<serde_json::Value>,
    #[serde(default)]
    outline_history: Option<Vec<String>>,
    #[serde(default)]
    current_history_index: Option<usize>,
    #[serde(default)]
    custom_instructions: Option<String>,
    #[serde(default)]
    last_modified: Option<i64>,
}

impl From<StoredProject> for Project {
    fn from(stored: StoredProject) -> Self {
        let outline = stored.outline.unwrap_or_default();
        let mut history = match stored.outline_history {
            Some(snapshots) => {
                OutlineHistory::from_parts(snapshots, stored.current_history_index.unwrap_or(0))
            }
            None => OutlineHistory::with_initial(outline.clone()),
        };
        // A legacy outline edited outside the history becomes the newest snapshot.
        if history.current() != outline {
            history.append(outline.clone());
        }

        let chat_history = stored
            .chat_history
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        Self {
            id: stored.id,
            title: stored.title.unwrap_or_else(|| UNTITLED.to_string()),
            outline,
            chat_history,
            history,
            custom_instructions: stored.custom_instructions.unwrap_or_default(),
            last_modified: stored.last_modified.unwrap_or(0),
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// A fresh, empty "Untitled Document".
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: UNTITLED.to_string(),
            outline: String::new(),
            chat_history: Vec::new(),
            history: OutlineHistory::new(),
            custom_instructions: String::new(),
            last_modified: now_millis(),
        }
    }

    pub fn outline(&self) -> &str {
        &self.outline
    }

    pub fn history(&self) -> &OutlineHistory {
        &self.history
    }

    /// Replace the outline, recording it in history. Setting the outline it
    /// already has is a no-op and returns false.
    pub fn set_outline(&mut self, outline: impl Into<String>) -> bool {
        let outline = outline.into();
        if outline == self.outline {
            return false;
        }
        self.history.append(outline.clone());
        self.outline = outline;
        self.touch();
        true
    }

    pub fn undo(&mut self) -> Result<&str, HistoryError> {
        self.outline = self.history.undo()?.to_string();
        self.touch();
        Ok(&self.outline)
    }

    pub fn redo(&mut self) -> Result<&str, HistoryError> {
        self.outline = self.history.redo()?.to_string();
        self.touch();
        Ok(&self.outline)
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.chat_history.push(message);
        self.touch();
    }

    /// Reset title and chat and record an empty outline. Earlier outlines
    /// stay reachable through undo.
    pub fn clear(&mut self) {
        self.title = UNTITLED.to_string();
        self.chat_history.clear();
        if !self.outline.is_empty() {
            self.history.append(String::new());
            self.outline.clear();
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }

    /// File name used when exporting the outline: the title with every
    /// non-alphanumeric character replaced by `_`, lowercased.
    pub fn export_file_name(&self) -> String {
        let stem: String = self
            .title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{stem}.txt")
    }
}
