//! # fstore-server — Content-Addressed File Store Server
//!
//! Stores files in a flat directory and serves them over one HTTP resource,
//! `/files`. Before uploading, clients offer `(name, SHA-256)` pairs; any
//! pair whose content is already stored under some name is satisfied by a
//! server-side copy, and only the unresolved remainder travels as a
//! multipart upload.
//!
//! ## Layout
//!
//! - [`storage`]: the storage root, staged writes, atomic commits.
//! - [`dedup`]: digest index and per-pair negotiation outcomes.
//! - [`upload`]: streaming multipart receiver with digest verification.
//! - [`stats`]: word count and frequent words.
//! - [`routes`]: the `/files` handlers.
//! - [`middleware`]: tracing and Prometheus metrics.
//!
//! The router is a plain value built by [`app`]; nothing is registered
//! globally, so tests can build as many independent servers as they like.

pub mod config;
pub mod dedup;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod stats;
pub mod storage;
pub mod upload;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tokio::net::TcpListener;

use crate::middleware::metrics::metrics_middleware;

pub use config::{ConfigError, ServerConfig};
pub use error::AppError;
pub use state::AppState;
pub use storage::FileStore;

/// Assemble the application router.
///
/// Middleware execution order (outermost → innermost):
///   TraceLayer → MetricsMiddleware → body limit → Handler
pub fn app(state: AppState) -> Router {
    let metrics_on = state.config.metrics_enabled;

    let mut files = routes::files::router()
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    if metrics_on {
        files = files
            .layer(from_fn(metrics_middleware))
            .layer(Extension(state.metrics.clone()));
    }

    let files = files
        .layer(middleware::tracing_layer::layer())
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    if metrics_on {
        probes = probes.route("/metrics", get(prometheus_metrics));
    }

    Router::new().merge(probes.with_state(state)).merge(files)
}

/// Serve `state` on an already-bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// GET /metrics: Prometheus scrape endpoint.
///
/// Refreshes the stored-files gauge from the storage root, then encodes
/// every metric in Prometheus text exposition format.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.list()).await {
        Ok(Ok(files)) => state.metrics.stored_files().set(files.len() as i64),
        Ok(Err(e)) => tracing::warn!("failed to count stored files: {e}"),
        Err(e) => tracing::warn!("stored file count task failed: {e}"),
    }

    match state.metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe. Always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 "ready" while a file can be created in the storage
/// root, 503 otherwise.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.clone();
    let writable = tokio::task::spawn_blocking(move || store.is_writable())
        .await
        .unwrap_or(false);
    if writable {
        (StatusCode::OK, "ready").into_response()
    } else {
        tracing::warn!(root = %state.store.root().display(), "storage root not writable");
        (StatusCode::SERVICE_UNAVAILABLE, "storage root not writable").into_response()
    }
}
