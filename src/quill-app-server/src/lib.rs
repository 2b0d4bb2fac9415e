//! Quill App Server - HTTP API server for the Quill writing assistant.
//!
//! This crate provides:
//! - `POST /api/generate-outline`: chat replies and outline updates
//! - `GET /api/health`: liveness and provider status
//!
//! The server holds no user data; projects live with the client.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod error;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if config.expose_error_details {
        warn!("Error responses include diagnostic details; set QUILL_ENV=production to hide them");
    }

    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router_with_state(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting Quill server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let signal = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
    };

    let drain = Duration::from_secs(config.shutdown_timeout);
    if drain_with_deadline(server, signalled_rx, drain).await? {
        info!("Server shut down");
    } else {
        warn!(
            "In-flight requests still running after {}s; shutting down anyway",
            config.shutdown_timeout
        );
    }
    Ok(())
}

/// Drive `server` to completion, giving it at most `drain` once the
/// shutdown signal fires. Returns `false` when the deadline cut it short.
async fn drain_with_deadline<S>(
    server: S,
    signalled: oneshot::Receiver<()>,
    drain: Duration,
) -> std::io::Result<bool>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map(|()| true),
        fired = signalled => {
            // The sender only drops unsent if the server stopped on its own
            if fired.is_err() {
                return server.await.map(|()| true);
            }
        }
    }

    match tokio::time::timeout(drain, server).await {
        Ok(result) => result.map(|()| true),
        Err(_) => Ok(false),
    }
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = state.config.max_body_size;

    Router::new()
        .nest("/api", api::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
