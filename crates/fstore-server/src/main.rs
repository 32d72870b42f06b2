//! # store-server — Binary Entry Point
//!
//! Prepares the storage root and starts the Axum HTTP server.
//! Configuration comes from `FSTORE_*` environment variables.

use std::net::SocketAddr;

use fstore_server::{AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;

    // Refuse to start without a usable storage root.
    let store = config.prepare_storage_root().map_err(|e| {
        tracing::error!("Startup check failed: {e}");
        e
    })?;
    tracing::info!(
        root = %config.root.display(),
        verify_uploads = config.verify_uploads,
        max_upload_bytes = config.max_upload_bytes,
        "storage root ready"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, store);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("store-server listening on {addr}");
    fstore_server::serve(listener, state).await?;

    Ok(())
}
