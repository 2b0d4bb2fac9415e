//! Quill Engine - Outline generation for the Quill writing assistant.
//!
//! This crate contains the core functionality:
//! - Prompt assembly from project context and instruction overrides
//! - An OpenAI-compatible model client behind the [`ModelClient`] seam
//! - Bounded retry with exponential backoff and jitter
//! - Title extraction and normalization for document responses
//!
//! NOTE: This crate should NOT contain any HTTP server or persistence code.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod client;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod request;
pub mod retry;
pub mod title;

pub use client::{
    ChatRequest, ChatResponse, Message, MessageRole, ModelClient, OpenAiClient, TokenUsage,
    create_client_from_env,
};
pub use error::{QuillError, Result};
pub use generator::{GenerationSettings, OutlineGenerator};
pub use request::{CompletionRequest, CompletionResult, HistoryRole, HistoryTurn};
pub use retry::{BackoffStrategy, Retry, RetryConfig, RetryDecision};
pub use title::{TitleMatch, extract_title, normalize_title};
