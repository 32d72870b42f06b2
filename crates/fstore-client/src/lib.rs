//! # fstore-client — Typed client for the file store
//!
//! Uploads follow a two-phase exchange:
//!
//! 1. **Negotiate** ([`StoreClient::negotiate`]): hash every candidate
//!    locally and offer `(base name, digest)` pairs. The server copies any
//!    content it already holds and returns the rest.
//! 2. **Bulk transfer** ([`StoreClient::bulk_upload`]): send only the
//!    remaining files as one multipart request.
//!
//! Negotiation is an optimization and fails open: any transport, status, or
//! decode failure sends every candidate through bulk transfer.
//!
//! The remaining `/files` operations (list, delete, word count, frequent
//! words) live in [`catalog`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod negotiate;
pub(crate) mod retry;
pub mod upload;

pub use config::ClientConfig;
pub use error::ClientError;
pub use negotiate::NegotiationReport;
pub use upload::{FileFailure, UploadReport};

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use url::Url;

/// Client for one store server.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    files_url: Url,
    max_retries: u32,
}

/// Result of [`StoreClient::upload_files`].
#[derive(Debug, Clone, Default)]
pub struct UploadOutcome {
    pub negotiation: NegotiationReport,
    /// `None` when negotiation resolved every file and nothing was sent.
    pub transfer: Option<UploadReport>,
}

impl UploadOutcome {
    /// Local paths that could not be stored.
    pub fn failures(&self) -> &[FileFailure] {
        match &self.transfer {
            Some(transfer) => &transfer.failed,
            None => &[],
        }
    }
}

impl StoreClient {
    /// Create a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let files_url = config.files_url()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            files_url,
            max_retries: config.max_retries,
        })
    }

    pub fn files_url(&self) -> &Url {
        &self.files_url
    }

    /// Add or replace `paths` on the server: negotiate, then bulk-transfer
    /// whatever negotiation did not resolve.
    ///
    /// Fails only if the bulk transfer itself fails; negotiation problems
    /// are absorbed by the fail-open fallback.
    pub async fn upload_files(&self, paths: &[PathBuf]) -> Result<UploadOutcome, ClientError> {
        let negotiation = self.negotiate(paths).await;
        tracing::info!(
            candidates = paths.len(),
            resolved = negotiation.resolved.len(),
            pending = negotiation.pending.len(),
            fell_back = negotiation.fell_back,
            "negotiation finished"
        );

        if negotiation.pending.is_empty() {
            return Ok(UploadOutcome {
                negotiation,
                transfer: None,
            });
        }
        let transfer = self.bulk_upload(&negotiation.pending).await?;
        Ok(UploadOutcome {
            negotiation,
            transfer: Some(transfer),
        })
    }

    /// Send a request (retrying transport failures) and require a 2xx status.
    async fn send<F>(&self, endpoint: &str, build: F) -> Result<reqwest::Response, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let resp = retry::retry_send(self.max_retries, || build().send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ApiError {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T, F>(&self, endpoint: &str, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        self.send(endpoint, build)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            })
    }
}
