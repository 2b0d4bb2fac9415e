//! The outline generation pipeline.
//!
//! `validate -> assemble -> submit (with retries) -> decode`

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{ChatRequest, ModelClient};
use crate::error::Result;
use crate::prompt::build_messages;
use crate::request::{CompletionRequest, CompletionResult};
use crate::retry::{Retry, RetryConfig, classify};
use crate::title::extract_title;

pub const DEFAULT_MODEL: &str = "gpt-4-0125-preview";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Turns completion requests into chat replies or outlines.
pub struct OutlineGenerator {
    client: Arc<dyn ModelClient>,
    retry: Retry,
    settings: GenerationSettings,
}

impl std::fmt::Debug for OutlineGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlineGenerator")
            .field("provider", &self.client.provider())
            .field("retry", &self.retry)
            .field("settings", &self.settings)
            .finish()
    }
}

impl OutlineGenerator {
    /// Create a generator with default settings and retry policy.
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            retry: Retry::default_retry(),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = Retry::new(config);
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Run one completion.
    ///
    /// Validation failures return before the provider is contacted.
    /// Transient provider errors are retried within the retry budget;
    /// everything else is returned as soon as it happens.
    pub async fn generate(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let prompt = request.validate()?;
        let messages = build_messages(request, prompt);

        let chat = ChatRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
        };

        debug!(
            provider = self.client.provider(),
            messages = chat.messages.len(),
            document = request.is_document_request,
            "Submitting completion"
        );

        let started = Instant::now();
        let response = self
            .retry
            .execute(classify, || self.client.chat(&chat))
            .await
            .inspect_err(|e| warn!(error = %e, "Completion failed"))?;

        info!(
            elapsed_ms = started.elapsed().as_millis(),
            total_tokens = response.usage.total_tokens,
            document = request.is_document_request,
            "Completion finished"
        );

        Ok(decode(response.text, request.is_document_request))
    }
}

/// Decode provider text into a result of the requested kind.
pub fn decode(text: String, is_document_request: bool) -> CompletionResult {
    if !is_document_request {
        return CompletionResult::Chat {
            chat_response: text,
        };
    }

    let (outline, suggested_title) = extract_title(&text).into_parts(&text);
    debug!(
        has_title = suggested_title.is_some(),
        outline_len = outline.len(),
        "Decoded document response"
    );
    CompletionResult::Document {
        outline,
        suggested_title,
    }
}
