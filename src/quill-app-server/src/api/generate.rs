//! Outline generation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quill_engine::{CompletionRequest, CompletionResult, QuillError};
use tracing::{info, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Produce a chat reply or an updated outline.
///
/// Validation happens before the credential check, so a bad request is
/// reported as such even on a server without a provider key.
pub async fn generate_outline(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Response {
    let expose = state.config.expose_error_details;

    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            let error = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge
            } else {
                AppError::BadRequest(rejection.body_text())
            };
            warn!(error = %error, "Rejected request body");
            return error.into_response();
        }
    };

    let prompt_len = match request.validate() {
        Ok(prompt) => prompt.chars().count(),
        Err(e) => return failure(e, expose),
    };

    let generator = match state.generator() {
        Ok(generator) => generator,
        Err(e) => {
            warn!(error = %e, "Generation requested without a provider credential");
            return e.into_response();
        }
    };

    info!(
        document = request.is_document_request,
        has_outline = request.current_outline.is_some(),
        has_title = request.current_title.is_some(),
        history = request.history().len(),
        prompt_len,
        "Generating outline"
    );

    let timeout = state.config.request_timeout_duration();
    match tokio::time::timeout(timeout, generator.generate(&request)).await {
        Ok(Ok(result)) => {
            match &result {
                CompletionResult::Document {
                    outline,
                    suggested_title,
                } => info!(
                    has_title = suggested_title.is_some(),
                    outline_len = outline.len(),
                    "Returning document"
                ),
                CompletionResult::Chat { chat_response } => {
                    info!(reply_len = chat_response.len(), "Returning chat reply")
                }
            }
            Json(result).into_response()
        }
        Ok(Err(e)) => failure(e, expose),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Generation timed out");
            AppError::Timeout.into_response()
        }
    }
}

fn failure(error: QuillError, expose: bool) -> Response {
    warn!(error = %error, "Generation failed");
    let details = expose.then(|| format!("{error:?}"));
    AppError::from(error).into_response_with_details(details)
}
