//! Prompt assembly.
//!
//! Turns a [`CompletionRequest`] into the message sequence sent to the
//! provider:
//!
//! 1. one system message built from the behavioral, style, project and
//!    technical blocks (a caller override replaces its default block),
//! 2. the current title, if any,
//! 3. the current outline, if any,
//! 4. the most recent [`CHAT_CONTEXT_LIMIT`] history turns, oldest first,
//! 5. the user prompt, with [`DOCUMENT_REQUEST_SUFFIX`] for document requests.

use crate::client::Message;
use crate::request::{CompletionRequest, HistoryRole, HistoryTurn};

/// Number of prior turns forwarded to the provider.
pub const CHAT_CONTEXT_LIMIT: usize = 10;

pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "\
You are a friendly, engaging screenwriter who loves brainstorming ideas and \
having creative discussions. You work in two distinct modes.

CHAT: be warm and conversational. Share reactions, ask questions, offer \
alternatives, reference films and books, and encourage the writer.

DOCUMENT: be structured and precise. No academic numbering (I., A., B.), no \
meta-commentary, no scenes that have not been discussed. Each scene is a \
heading of the form LOCATION - SPECIFIC TIME followed by bullet points of \
concrete detail: character action, sensory information, exact dialogue or \
sound, physical movement.

Never mix the two modes: chat is for exploration, the document is for final, \
polished content.";

pub const DEFAULT_STYLE_INSTRUCTIONS: &str = "\
Get to know the writer's creative vision as you work together: the tone they \
are drawn to, what makes writing exciting for them, writers or styles that \
inspire them, who they want to reach and what they want readers to feel. \
Refine these preferences together over the conversation.";

pub const DEFAULT_TECHNICAL_INSTRUCTIONS: &str = "\
- Always provide title suggestions on their own line with a \"Title:\" prefix
- Do not wrap titles in quotes
- Structure outlines with clear hierarchical bullet points
- Keep outline formatting consistent and preserve existing structure when updating";

pub const TITLE_REQUIREMENTS: &str = "\
Title Requirements:
When suggesting a title:
1. Make it iconic and memorable (1-3 words unless it's a known phrase)
2. Use cultural references when relevant (songs, bands, movies)
3. Consider idioms and metaphors that fit thematically
4. Avoid literal descriptions
5. Be willing to iterate and refine based on feedback";

/// Appended to the user prompt for document requests.
pub const DOCUMENT_REQUEST_SUFFIX: &str = "\n\n\
Respond with the complete outline in the structured document format. Begin \
with a line of the form \"Title: <title>\" suggesting an iconic, memorable \
title (1-3 words or a relevant idiom) that captures the essence of this document.";

/// Treat empty or whitespace-only overrides as absent.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Build the combined system message content.
pub fn system_prompt(request: &CompletionRequest) -> String {
    let system = non_empty(request.system_instructions.as_deref())
        .unwrap_or(DEFAULT_SYSTEM_INSTRUCTIONS);
    let style =
        non_empty(request.style_instructions.as_deref()).unwrap_or(DEFAULT_STYLE_INSTRUCTIONS);
    let technical = non_empty(request.technical_instructions.as_deref())
        .unwrap_or(DEFAULT_TECHNICAL_INSTRUCTIONS);

    let mut out = String::with_capacity(system.len() + style.len() + technical.len() + 512);
    out.push_str(system);
    out.push_str("\n\nWriting Style Preferences:\n");
    out.push_str(style);
    if let Some(custom) = non_empty(request.custom_instructions.as_deref()) {
        out.push_str("\n\nProject-Specific Instructions:\n");
        out.push_str(custom);
    }
    out.push_str("\n\nTechnical Requirements:\n");
    out.push_str(technical);
    out.push_str("\n\n");
    out.push_str(TITLE_REQUIREMENTS);
    out.push_str("\n\nIMPORTANT: ");
    out.push_str(if request.is_document_request {
        "This is a document request - use structured document format."
    } else {
        "This is a chat interaction - be conversational and engaging."
    });
    out
}

/// The most recent turns that fit in the context window, in original order.
pub fn recent_history(history: &[HistoryTurn]) -> &[HistoryTurn] {
    &history[history.len().saturating_sub(CHAT_CONTEXT_LIMIT)..]
}

/// Assemble the full message sequence. `prompt` is the validated prompt.
pub fn build_messages(request: &CompletionRequest, prompt: &str) -> Vec<Message> {
    let history = recent_history(request.history());
    let mut messages = Vec::with_capacity(history.len() + 4);

    messages.push(Message::system(system_prompt(request)));

    if let Some(title) = non_empty(request.current_title.as_deref()) {
        messages.push(Message::system(format!(
            "The current document title is \"{title}\"."
        )));
    }

    if let Some(outline) = non_empty(request.current_outline.as_deref()) {
        messages.push(Message::system(format!(
            "The current outline is:\n\n{outline}"
        )));
    }

    messages.extend(history.iter().map(|turn| match turn.role {
        HistoryRole::User => Message::user(turn.content.clone()),
        HistoryRole::Assistant => Message::assistant(turn.content.clone()),
    }));

    if request.is_document_request {
        messages.push(Message::user(format!("{prompt}{DOCUMENT_REQUEST_SUFFIX}")));
    } else {
        messages.push(Message::user(prompt));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MessageRole;

    #[test]
    fn test_minimal_chat_request() {
        let request = CompletionRequest::new("hello");
        let messages = build_messages(&request, "hello");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.starts_with(DEFAULT_SYSTEM_INSTRUCTIONS));
        assert!(messages[0].content.contains("This is a chat interaction"));
        assert!(!messages[0].content.contains("Project-Specific Instructions"));
        assert_eq!(messages[1], Message::user("hello"));
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let request = CompletionRequest {
            system_instructions: Some("Be a noir novelist.".into()),
            style_instructions: Some("Hardboiled.".into()),
            technical_instructions: Some("   ".into()),
            custom_instructions: Some("Set in 1947 Los Angeles.".into()),
            ..CompletionRequest::new("go")
        };
        let system = system_prompt(&request);

        assert!(system.starts_with("Be a noir novelist."));
        assert!(!system.contains(DEFAULT_SYSTEM_INSTRUCTIONS));
        assert!(system.contains("Writing Style Preferences:\nHardboiled."));
        assert!(!system.contains(DEFAULT_STYLE_INSTRUCTIONS));
        assert!(system.contains("Project-Specific Instructions:\nSet in 1947 Los Angeles."));
        // blank override falls back to the default block
        assert!(system.contains(DEFAULT_TECHNICAL_INSTRUCTIONS));
    }

    #[test]
    fn test_message_order_for_document_request() {
        let request = CompletionRequest {
            current_title: Some("Glass Houses".into()),
            current_outline: Some("KITCHEN - DAWN\n- kettle screams".into()),
            chat_history: Some(vec![
                HistoryTurn::user("a story about neighbors"),
                HistoryTurn::assistant("love it"),
            ]),
            ..CompletionRequest::new("update the outline").document()
        };
        let messages = build_messages(&request, "update the outline");

        assert_eq!(messages.len(), 6);
        assert!(messages[0].content.contains("This is a document request"));
        assert_eq!(
            messages[1],
            Message::system("The current document title is \"Glass Houses\".")
        );
        assert!(messages[2].content.ends_with("KITCHEN - DAWN\n- kettle screams"));
        assert_eq!(messages[3], Message::user("a story about neighbors"));
        assert_eq!(messages[4], Message::assistant("love it"));
        assert_eq!(messages[5].role, MessageRole::User);
        assert!(messages[5].content.starts_with("update the outline"));
        assert!(messages[5].content.ends_with(DOCUMENT_REQUEST_SUFFIX));
    }

    #[test]
    fn test_history_trimmed_to_most_recent() {
        let history: Vec<HistoryTurn> = (0..15)
            .map(|i| HistoryTurn::user(format!("turn {i}")))
            .collect();
        let request = CompletionRequest {
            chat_history: Some(history),
            ..CompletionRequest::new("next")
        };
        let messages = build_messages(&request, "next");

        let forwarded: Vec<&str> = messages[1..messages.len() - 1]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        let expected: Vec<String> = (5..15).map(|i| format!("turn {i}")).collect();
        assert_eq!(forwarded, expected);
    }

    #[test]
    fn test_empty_title_and_outline_are_skipped() {
        let request = CompletionRequest {
            current_title: Some(String::new()),
            current_outline: Some("  \n".into()),
            ..CompletionRequest::new("hi")
        };
        assert_eq!(build_messages(&request, "hi").len(), 2);
    }
}
