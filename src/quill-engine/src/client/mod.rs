//! LLM provider client.
//!
//! Provides the [`ModelClient`] seam the generation pipeline talks to, and an
//! OpenAI-compatible implementation.

mod openai;
pub mod types;

pub use openai::{DEFAULT_OPENAI_URL, OpenAiClient};
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for model clients.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Get the provider name.
    fn provider(&self) -> &str;

    /// Send a single chat completion request. Implementations make exactly
    /// one attempt; retrying is the caller's concern.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the provider base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Create a provider client from the environment.
///
/// A missing credential is a configuration error, reported to the caller
/// rather than treated as fatal.
pub fn create_client_from_env() -> Result<Box<dyn ModelClient>> {
    let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
    let base_url = std::env::var(BASE_URL_ENV).ok();
    Ok(Box::new(OpenAiClient::new(api_key, base_url)?))
}
