//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;

use super::{ChatRequest, ChatResponse, ModelClient, TokenUsage};
use crate::error::{QuillError, Result};

/// Default provider URL.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Ceiling for a single provider attempt.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Create a new client. Fails with a configuration error when the
    /// credential is empty.
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        Self::with_timeout(api_key, base_url, ATTEMPT_TIMEOUT)
    }

    /// Create a new client with a custom per-attempt timeout.
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(QuillError::config(
                "OpenAI API key is not configured. Set OPENAI_API_KEY in the environment.",
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull `error.message` out of a provider error body, falling back to a
/// truncated raw body.
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(String::from))
        .unwrap_or_else(|| {
            let preview: String = body.chars().take(200).collect();
            if preview.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {preview}")
            }
        })
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.completions_url();

        tracing::debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| QuillError::from_reqwest(e, &url))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = resp.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);

            tracing::warn!(status = %status, retry_after = ?retry_after, "Provider request failed");
            return Err(QuillError::from_status(
                status.as_u16(),
                message,
                retry_after,
            ));
        }

        let body: CompletionBody = resp
            .json()
            .await
            .map_err(|e| QuillError::InvalidResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| QuillError::InvalidResponse("response has no choices".to_string()))?;

        let usage = body.usage.unwrap_or_default();
        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Chat completion received"
        );

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            usage,
            finish_reason: choice.finish_reason,
        })
    }
}
