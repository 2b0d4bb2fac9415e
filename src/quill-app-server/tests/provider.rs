//! End-to-end tests against a mock OpenAI-compatible provider.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use quill_app_server::{AppState, ServerConfig, create_router};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.provider.api_key = Some("sk-test".into());
    config.provider.base_url = Some(server.uri());
    config.generation.initial_backoff_ms = 1;
    config.generation.max_backoff_ms = 5;
    config.generation.jitter = 0.0;
    config
}

async fn generate(config: ServerConfig, payload: Value) -> (StatusCode, Value) {
    let response = create_router(AppState::new(config))
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/generate-outline")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160}
    }))
}

#[tokio::test]
async fn test_sends_configured_sampling_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header_matcher("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4-0125-preview",
            "temperature": 0.7,
            "max_tokens": 1500
        })))
        .respond_with(completion("Title: \"GLASS HOUSES\"\n\nKITCHEN - DAWN"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, value) = generate(
        config_for(&server),
        json!({"prompt": "draft the outline", "isDocumentRequest": true}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        value,
        json!({"outline": "KITCHEN - DAWN", "suggestedTitle": "Glass Houses"})
    );
}

#[tokio::test]
async fn test_provider_outage_is_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({"error": {"message": "The server is overloaded"}})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let (status, value) = generate(config_for(&server), json!({"prompt": "hello"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(
        value["error"]
            .as_str()
            .unwrap()
            .contains("The server is overloaded")
    );
}

#[tokio::test]
async fn test_rejected_credential_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (status, value) = generate(config_for(&server), json!({"prompt": "hello"})).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["code"], "authentication_failed");
}
