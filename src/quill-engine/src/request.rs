//! Completion request and result types exchanged with clients.

use serde::{Deserialize, Serialize};

use crate::error::{QuillError, Result};

/// A request to produce either a chat reply or an updated outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// What the user typed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// The outline as it currently stands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_outline: Option<String>,
    /// The current document title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_title: Option<String>,
    /// Per-project instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    /// Replaces the default writing-style block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_instructions: Option<String>,
    /// Replaces the default behavioral block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,
    /// Replaces the default technical block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_instructions: Option<String>,
    /// Prior conversation, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<HistoryTurn>>,
    /// Produce outline content instead of a conversational reply.
    #[serde(default)]
    pub is_document_request: bool,
}

impl CompletionRequest {
    /// Create a request for the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    /// Mark this as a document request.
    pub fn document(mut self) -> Self {
        self.is_document_request = true;
        self
    }

    /// Check the request and return the trimmed prompt.
    pub fn validate(&self) -> Result<&str> {
        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => Ok(prompt),
            _ => Err(QuillError::validation("Prompt is required")),
        }
    }

    /// Chat history, empty when absent.
    pub fn history(&self) -> &[HistoryTurn] {
        self.chat_history.as_deref().unwrap_or_default()
    }
}

/// One prior conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub content: String,
}

impl HistoryTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::Assistant,
            content: content.into(),
        }
    }
}

/// Who spoke a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    #[serde(alias = "ai")]
    Assistant,
}

/// Result of a completion: a chat reply or an outline with an optional title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionResult {
    Document {
        outline: String,
        #[serde(rename = "suggestedTitle")]
        suggested_title: Option<String>,
    },
    Chat {
        #[serde(rename = "chatResponse")]
        chat_response: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prompt() {
        assert_eq!(CompletionRequest::new("  hi ").validate().unwrap(), "hi");
        assert!(CompletionRequest::new("   ").validate().is_err());
        assert!(CompletionRequest::default().validate().is_err());
    }

    #[test]
    fn test_deserialize_wire_request() {
        let req: CompletionRequest = serde_json::from_value(serde_json::json!({
            "prompt": "outline a heist",
            "currentTitle": "Untitled Document",
            "styleInstructions": null,
            "chatHistory": [
                {"role": "user", "content": "hello"},
                {"role": "ai", "content": "hi!"}
            ],
            "isDocumentRequest": true
        }))
        .unwrap();

        assert!(req.is_document_request);
        assert_eq!(req.current_title.as_deref(), Some("Untitled Document"));
        assert_eq!(req.style_instructions, None);
        assert_eq!(req.history()[1].role, HistoryRole::Assistant);
    }

    #[test]
    fn test_malformed_history_is_rejected() {
        let result = serde_json::from_value::<CompletionRequest>(serde_json::json!({
            "prompt": "x",
            "chatHistory": [{"speaker": "user", "text": "hello"}]
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<CompletionRequest>(serde_json::json!({
            "prompt": "x",
            "chatHistory": "not a list"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_wire_shapes() {
        let doc = CompletionResult::Document {
            outline: "body".into(),
            suggested_title: None,
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            serde_json::json!({"outline": "body", "suggestedTitle": null})
        );

        let chat: CompletionResult =
            serde_json::from_value(serde_json::json!({"chatResponse": "hey"})).unwrap();
        assert_eq!(
            chat,
            CompletionResult::Chat {
                chat_response: "hey".into()
            }
        );
    }
}
