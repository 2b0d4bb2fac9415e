//! Application state management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quill_engine::{ModelClient, OpenAiClient, OutlineGenerator};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Application state shared across request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Outline generator; `None` when no provider credential is configured.
    generator: Option<Arc<OutlineGenerator>>,
    /// Start time.
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("generator", &self.generator)
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// Create application state, building the provider client from config.
    ///
    /// A missing credential is not fatal: the server starts and reports a
    /// configuration error on each generation request.
    pub fn new(config: ServerConfig) -> Self {
        let client = config.provider.api_key.as_deref().map(|key| {
            OpenAiClient::with_timeout(
                key,
                config.provider.base_url.clone(),
                config.request_timeout_duration(),
            )
        });

        let generator = match client {
            Some(Ok(client)) => {
                info!(base_url = %client.base_url(), model = %config.provider.model, "Provider configured");
                Some(Arc::new(Self::build_generator(&config, Arc::new(client))))
            }
            Some(Err(e)) => {
                warn!(error = %e, "Provider client could not be created");
                None
            }
            None => {
                warn!("OPENAI_API_KEY is not set; generation requests will fail until it is configured");
                None
            }
        };

        Self {
            config,
            generator,
            start_time: Instant::now(),
        }
    }

    /// Create application state around an existing model client.
    pub fn with_client(config: ServerConfig, client: Arc<dyn ModelClient>) -> Self {
        let generator = Self::build_generator(&config, client);
        Self {
            config,
            generator: Some(Arc::new(generator)),
            start_time: Instant::now(),
        }
    }

    fn build_generator(config: &ServerConfig, client: Arc<dyn ModelClient>) -> OutlineGenerator {
        OutlineGenerator::new(client)
            .with_settings(config.generation_settings())
            .with_retry(config.retry_config())
    }

    /// The generator, or a configuration error when no credential is set.
    pub fn generator(&self) -> AppResult<Arc<OutlineGenerator>> {
        self.generator.clone().ok_or_else(|| {
            AppError::Configuration(
                "OpenAI API key is not configured. Set OPENAI_API_KEY in the environment."
                    .to_string(),
            )
        })
    }

    pub fn provider_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Get uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
