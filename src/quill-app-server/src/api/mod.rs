//! REST API routes and handlers.

mod generate;
mod health;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub use types::HealthResponse;

/// Create the API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/generate-outline", post(generate::generate_outline))
}
