//! Backends that turn a completion request into a reply.
//!
//! [`HttpOutlineService`] talks to a running `quill-server`;
//! [`LocalOutlineService`] runs the generation pipeline in-process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_engine::{CompletionRequest, CompletionResult, OutlineGenerator, QuillError};
use serde::Deserialize;
use tracing::{debug, warn};

/// Default server address.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3100";

/// Whole-request ceiling for the in-process backend.
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// The server's own ceiling is 30 seconds; leave room for the round trip.
const HTTP_TIMEOUT: Duration = Duration::from_secs(45);

/// Errors a backend reports for a single request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The server answered with an error body.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Could not reach {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid API response format")]
    InvalidResponse,

    #[error("Request timed out")]
    Timeout,

    /// The in-process backend could not be set up.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Engine(#[from] QuillError),
}

/// Something that can answer a completion request.
#[async_trait]
pub trait OutlineService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
    -> Result<CompletionResult, ServiceError>;
}

#[async_trait]
impl<T: OutlineService + ?Sized> OutlineService for Box<T> {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, ServiceError> {
        (**self).complete(request).await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for `POST {server}/api/generate-outline`.
#[derive(Debug, Clone)]
pub struct HttpOutlineService {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpOutlineService {
    pub fn new(server_url: &str) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Transport {
                url: server_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/generate-outline", server_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OutlineService for HttpOutlineService {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, ServiceError> {
        debug!(endpoint = %self.endpoint, document = request.is_document_request, "Sending request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout
                } else {
                    ServiceError::Transport {
                        url: self.endpoint.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ServiceError::Transport {
            url: self.endpoint.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    format!(
                        "API Error: {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    )
                });
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|_| ServiceError::InvalidResponse)
    }
}

/// Runs the generation pipeline in this process.
#[derive(Debug, Clone)]
pub struct LocalOutlineService {
    generator: Result<Arc<OutlineGenerator>, String>,
    timeout: Duration,
}

impl LocalOutlineService {
    pub fn new(generator: OutlineGenerator) -> Self {
        Self {
            generator: Ok(Arc::new(generator)),
            timeout: LOCAL_TIMEOUT,
        }
    }

    /// Build a generator from `OPENAI_API_KEY` / `OPENAI_BASE_URL`.
    ///
    /// A missing credential does not fail here; every request reports it.
    pub fn from_env() -> Self {
        let client = match quill_engine::create_client_from_env() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "In-process generation is unavailable");
                return Self {
                    generator: Err(e.to_string()),
                    timeout: LOCAL_TIMEOUT,
                };
            }
        };
        let mut settings = quill_engine::GenerationSettings::default();
        if let Ok(model) = std::env::var("QUILL_MODEL") {
            settings.model = model;
        }
        Self::new(OutlineGenerator::new(Arc::from(client)).with_settings(settings))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl OutlineService for LocalOutlineService {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, ServiceError> {
        let generator = self
            .generator
            .as_ref()
            .map_err(|e| ServiceError::Unavailable(e.clone()))?;
        match tokio::time::timeout(self.timeout, generator.generate(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ServiceError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_document_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate-outline"))
            .and(body_partial_json(json!({
                "prompt": "outline it",
                "isDocumentRequest": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "outline": "KITCHEN - DAWN",
                "suggestedTitle": "Glass Houses"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = HttpOutlineService::new(&format!("{}/", server.uri())).unwrap();
        let result = service
            .complete(&CompletionRequest::new("outline it").document())
            .await
            .unwrap();

        assert_eq!(
            result,
            CompletionResult::Document {
                outline: "KITCHEN - DAWN".into(),
                suggested_title: Some("Glass Houses".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_http_error_body_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": "Rate limit exceeded: slow down",
                "code": "rate_limit_exceeded",
                "retryAfter": 20
            })))
            .mount(&server)
            .await;

        let service = HttpOutlineService::new(&server.uri()).unwrap();
        let err = service
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Api { status: 429, .. }));
        assert_eq!(err.to_string(), "Rate limit exceeded: slow down");
    }

    #[tokio::test]
    async fn test_http_error_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = HttpOutlineService::new(&server.uri()).unwrap();
        let err = service
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "API Error: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_http_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "?"})))
            .mount(&server)
            .await;

        let service = HttpOutlineService::new(&server.uri()).unwrap();
        let err = service
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidResponse));
    }
}
