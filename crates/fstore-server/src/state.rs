//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. Cloning is cheap: configuration is behind an
//! `Arc`, and [`FileStore`] and [`ApiMetrics`] share their internals.
//!
//! There is no in-memory file catalogue. The storage root is the only source
//! of truth, and the dedup index is rebuilt from it for each negotiation.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::storage::FileStore;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: FileStore,
    pub metrics: ApiMetrics,
}

impl AppState {
    /// State over an already-prepared store.
    pub fn new(config: ServerConfig, store: FileStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
            metrics: ApiMetrics::new(),
        }
    }

    /// State for `config.root` without startup checks. Tests use this with
    /// a temp directory.
    pub fn with_config(config: ServerConfig) -> Self {
        let store = FileStore::new(&config.root);
        Self::new(config, store)
    }
}
