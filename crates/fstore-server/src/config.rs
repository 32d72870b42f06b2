//! Server configuration.
//!
//! Every knob has a default; override via environment variables or explicit
//! construction in tests.

use std::fs;
use std::path::PathBuf;

use crate::storage::FileStore;

/// Default storage root, relative to the working directory.
pub const DEFAULT_ROOT: &str = "./test_files";

/// Default request body limit for bulk uploads: 512 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Runtime configuration for the file store server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding every stored file.
    pub root: PathBuf,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Body limit applied to `/files` requests.
    pub max_upload_bytes: usize,
    /// Reject bulk uploads whose parts do not hash to the declared digest.
    pub verify_uploads: bool,
    /// Mount `/metrics` and the request metrics middleware.
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            port: 8080,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            verify_uploads: true,
            metrics_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Configuration rooted at `root` with every other setting at its default.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FSTORE_ROOT` (default: `./test_files`)
    /// - `FSTORE_PORT` (default: 8080)
    /// - `FSTORE_MAX_UPLOAD_BYTES` (default: 536870912)
    /// - `FSTORE_VERIFY_UPLOADS` (default: true)
    /// - `FSTORE_METRICS_ENABLED` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            root: std::env::var_os("FSTORE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            port: env_parse("FSTORE_PORT", defaults.port)?,
            max_upload_bytes: env_parse("FSTORE_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            verify_uploads: env_flag("FSTORE_VERIFY_UPLOADS", defaults.verify_uploads),
            metrics_enabled: env_flag("FSTORE_METRICS_ENABLED", defaults.metrics_enabled),
        })
    }

    /// Create the storage root if missing and confirm files can be created
    /// in it. The server refuses to start otherwise.
    pub fn prepare_storage_root(&self) -> Result<FileStore, ConfigError> {
        fs::create_dir_all(&self.root).map_err(|e| ConfigError::StorageRoot {
            root: self.root.clone(),
            reason: e.to_string(),
        })?;
        if !self.root.is_dir() {
            return Err(ConfigError::StorageRoot {
                root: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }
        let store = FileStore::new(&self.root);
        if let Err(e) = store.stage() {
            return Err(ConfigError::StorageRoot {
                root: self.root.clone(),
                reason: format!("not writable: {e}"),
            });
        }
        Ok(store)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Anything other than `false` (any case) or `0` counts as enabled.
fn env_flag(var: &str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| {
            let v = v.trim().to_lowercase();
            v != "false" && v != "0"
        })
        .unwrap_or(default)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("storage root {} unusable: {reason}", root.display())]
    StorageRoot { root: PathBuf, reason: String },
}
