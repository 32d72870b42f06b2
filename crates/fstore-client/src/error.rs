//! Store client error types.

use std::path::PathBuf;

/// Errors from store server calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Server returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Response body was readable but not in the expected form.
    #[error("unexpected response from {endpoint}: {body:?}")]
    UnexpectedBody { endpoint: String, body: String },
    /// A local file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Every file in a bulk upload failed to be packaged; nothing was sent.
    #[error("all {count} files failed to be read, nothing uploaded")]
    AllFilesFailed { count: usize },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}
