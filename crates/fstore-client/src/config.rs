//! Store client configuration.
//!
//! Points at a store server's base URL. Override via environment variables
//! or explicit construction for tests.

use std::time::Duration;

use fstore_core::protocol::FILES_PATH;
use url::Url;

/// Default server base URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Configuration for connecting to a store server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server. The `/files` resource is resolved against it.
    pub server_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt on transport failure.
    pub max_retries: u32,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FSTORE_SERVER_URL` (default: `http://localhost:8080`)
    /// - `FSTORE_TIMEOUT_SECS` (default: 30)
    /// - `FSTORE_MAX_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_url: env_url("FSTORE_SERVER_URL", DEFAULT_SERVER_URL)?,
            timeout_secs: env_number("FSTORE_TIMEOUT_SECS", 30)?,
            max_retries: env_number("FSTORE_MAX_RETRIES", 3)?,
        })
    }

    /// Configuration for a server at `base` with a short timeout and no
    /// retries (for testing).
    pub fn for_url(base: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            server_url: parse_url("server url", base)?,
            timeout_secs: 5,
            max_retries: 0,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL of the `/files` resource. Any path on the base URL is
    /// kept as a prefix.
    pub fn files_url(&self) -> Result<Url, ConfigError> {
        let mut base = self.server_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(FILES_PATH.trim_start_matches('/'))
            .map_err(|e| ConfigError::InvalidUrl("files url".to_string(), e.to_string()))
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(
            var.to_string(),
            format!("{raw} cannot be used as a base URL"),
        ));
    }
    Ok(url)
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    parse_url(var, &raw)
}

fn env_number<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_url_appends_resource() {
        let cfg = ClientConfig::for_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.files_url().unwrap().as_str(), "http://127.0.0.1:9000/files");
    }

    #[test]
    fn files_url_keeps_base_path_prefix() {
        let cfg = ClientConfig::for_url("http://proxy.local/store").unwrap();
        assert_eq!(cfg.files_url().unwrap().as_str(), "http://proxy.local/store/files");
        let cfg = ClientConfig::for_url("http://proxy.local/store/").unwrap();
        assert_eq!(cfg.files_url().unwrap().as_str(), "http://proxy.local/store/files");
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("NONEXISTENT_VAR_FSTORE_URL", DEFAULT_SERVER_URL).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(ClientConfig::for_url("not a url").is_err());
        assert!(ClientConfig::for_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn env_number_rejects_garbage() {
        std::env::set_var("TEST_FSTORE_RETRIES_BAD", "many");
        let result = env_number::<u32>("TEST_FSTORE_RETRIES_BAD", 3);
        std::env::remove_var("TEST_FSTORE_RETRIES_BAD");
        assert!(matches!(result, Err(ConfigError::InvalidNumber(..))));
    }
}
