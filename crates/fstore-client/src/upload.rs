//! Bulk transfer: the multipart fallback for files negotiation did not
//! resolve.
//!
//! Each file becomes a binary part named by its base name plus a
//! `sha256_<name>` text field carrying its digest, which the server checks
//! against the bytes it receives. A file that cannot be read is reported
//! and skipped; the request fails outright only when no file could be read.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use fstore_core::protocol::digest_field_name;
use fstore_core::{base_name, sha256_bytes, ContentDigest};
use reqwest::multipart::{Form, Part};
use reqwest::Body;

use crate::error::ClientError;
use crate::StoreClient;

const ENDPOINT: &str = "POST /files";

/// A local file that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of one bulk transfer.
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub uploaded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
    pub bytes: u64,
}

#[derive(Debug)]
struct Packaged {
    path: PathBuf,
    name: String,
    data: Bytes,
    digest: ContentDigest,
}

async fn package(path: &Path) -> Result<Packaged, ClientError> {
    let name = base_name(path).ok_or_else(|| ClientError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "no usable file name"),
    })?;
    let data = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = sha256_bytes(&data);
    Ok(Packaged {
        path: path.to_path_buf(),
        name,
        data: Bytes::from(data),
        digest,
    })
}

/// Forms are consumed on send, so one is built per attempt. Parts share the
/// file buffers rather than copying them.
fn build_form(files: &[Packaged]) -> Form {
    files.iter().fold(Form::new(), |form, f| {
        let body = Body::from(f.data.clone());
        let part = Part::stream_with_length(body, f.data.len() as u64).file_name(f.name.clone());
        form.part(f.name.clone(), part)
            .text(digest_field_name(&f.name), f.digest.to_hex())
    })
}

impl StoreClient {
    /// Upload `paths` as one multipart request, replacing files of the same
    /// base name on the server.
    pub async fn bulk_upload(&self, paths: &[PathBuf]) -> Result<UploadReport, ClientError> {
        let mut report = UploadReport::default();
        if paths.is_empty() {
            return Ok(report);
        }

        let mut packaged = Vec::with_capacity(paths.len());
        for path in paths {
            match package(path).await {
                Ok(p) => packaged.push(p),
                Err(e) => {
                    tracing::warn!(file = %path.display(), "skipping file: {e}");
                    report.failed.push(FileFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        if packaged.is_empty() {
            return Err(ClientError::AllFilesFailed { count: paths.len() });
        }

        self.send(ENDPOINT, || {
            self.http
                .post(self.files_url.clone())
                .multipart(build_form(&packaged))
        })
        .await?;

        for p in packaged {
            tracing::debug!(file = %p.path.display(), name = %p.name, digest = %p.digest, "uploaded");
            report.bytes += p.data.len() as u64;
            report.uploaded.push(p.path);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn package_reads_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let p = package(&path).await.unwrap();
        assert_eq!(p.name, "a.txt");
        assert_eq!(&p.data[..], b"hello");
        assert_eq!(p.digest, sha256_bytes(b"hello"));
    }

    #[tokio::test]
    async fn package_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = package(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }

    #[test]
    fn form_has_boundary() {
        let files = vec![Packaged {
            path: PathBuf::from("a.txt"),
            name: "a.txt".into(),
            data: Bytes::from_static(b"x"),
            digest: sha256_bytes(b"x"),
        }];
        assert!(!build_form(&files).boundary().is_empty());
    }

    #[tokio::test]
    async fn forms_per_attempt_share_one_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![7u8; 1 << 20]).unwrap();
        let files = vec![package(&path).await.unwrap()];
        let before = files[0].data.as_ptr();

        let first = build_form(&files);
        let second = build_form(&files);
        assert_ne!(first.boundary(), second.boundary());
        assert_eq!(files[0].data.as_ptr(), before);
        assert_eq!(files[0].data.clone().as_ptr(), before);
    }
}
