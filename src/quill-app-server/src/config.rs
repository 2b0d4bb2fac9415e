//! Server configuration.

use std::time::Duration;

use quill_engine::client::{API_KEY_ENV, BASE_URL_ENV};
use quill_engine::generator::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use quill_engine::{BackoffStrategy, GenerationSettings, RetryConfig};
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:3100").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Sampling, retry and timeout settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Include the error source chain in error responses.
    #[serde(default = "default_true")]
    pub expose_error_details: bool,

    /// CORS origins (empty = allow all).
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3100".to_string()
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            expose_error_details: true,
            cors_origins: vec![],
            max_body_size: default_max_body_size(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file. The provider credential still comes
    /// from the environment when the file does not set one.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.provider.fill_from_env();
        config.apply_env_mode(std::env::var("QUILL_ENV").ok().as_deref());
        Ok(config)
    }

    /// `QUILL_ENV=production` hides error details whatever the file says.
    fn apply_env_mode(&mut self, env: Option<&str>) {
        if let Some(env) = env {
            self.expose_error_details = !env.eq_ignore_ascii_case("production");
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("QUILL_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        config.provider.fill_from_env();

        if let Ok(model) = std::env::var("QUILL_MODEL") {
            if !model.trim().is_empty() {
                config.provider.model = model;
            }
        }

        if let Ok(timeout) = std::env::var("QUILL_REQUEST_TIMEOUT") {
            config.generation.request_timeout = timeout.parse()?;
        }

        config.apply_env_mode(std::env::var("QUILL_ENV").ok().as_deref());

        if let Ok(origins) = std::env::var("QUILL_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// Get request timeout as Duration.
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.generation.request_timeout)
    }

    /// Sampling parameters for the generator.
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.provider.model.clone(),
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
        }
    }

    /// Retry policy for the generator.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.generation.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.generation.initial_backoff_ms),
            max_delay: Duration::from_millis(self.generation.max_backoff_ms),
            strategy: self.generation.backoff,
            jitter: self.generation.jitter.clamp(0.0, 1.0),
        }
    }
}

/// Provider configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider credential. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderConfig {
    /// Fill unset fields from `OPENAI_API_KEY` / `OPENAI_BASE_URL`.
    pub fn fill_from_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var(BASE_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty());
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Total provider attempts per request, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// How the delay grows between attempts.
    pub backoff: BackoffStrategy,
    /// Jitter factor (0.0 - 1.0).
    pub jitter: f64,
    /// Ceiling for a whole generation, all attempts included, in seconds.
    pub request_timeout: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            backoff: BackoffStrategy::ExponentialBackoff { multiplier: 2.0 },
            jitter: 0.2,
            request_timeout: 30,
        }
    }
}
