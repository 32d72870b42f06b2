//! # Bulk Transfer Receiver
//!
//! Accepts a `multipart/form-data` body carrying file parts plus one
//! `sha256_<name>` text field per file. Each file part is streamed straight
//! into a staging file while being hashed, so memory use is bounded by the
//! chunk size regardless of upload size.
//!
//! Nothing is committed until the whole body has been read and every
//! declared digest has been checked. A mismatch rejects the request and the
//! staging files are dropped (and so deleted).

use std::collections::{HashMap, VecDeque};

use axum::extract::multipart::{Field, Multipart};
use fstore_core::protocol::{digest_field_name, DIGEST_FIELD_PREFIX};
use fstore_core::{ContentDigest, StoredName, StreamingHasher};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::storage::FileStore;

/// A file part written to the staging area but not yet committed.
#[derive(Debug)]
struct StagedPart {
    field_name: String,
    name: StoredName,
    file: NamedTempFile,
    digest: ContentDigest,
    bytes: u64,
}

/// What a successful bulk upload committed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub files: Vec<String>,
    pub bytes: u64,
}

/// Read the whole multipart body, verify, then commit every file part.
pub async fn receive(
    store: &FileStore,
    mut multipart: Multipart,
    verify: bool,
) -> Result<UploadSummary, AppError> {
    let mut staged: Vec<StagedPart> = Vec::new();
    let mut declared = DeclaredDigests::default();

    while let Some(field) = multipart.next_field().await.map_err(AppError::from_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            Some(file_name) => {
                let raw = if file_name.is_empty() { &field_name } else { &file_name };
                let name = part_name(raw)?;
                staged.push(stage_part(store, field_name, name, field).await?);
            }
            None if field_name.starts_with(DIGEST_FIELD_PREFIX) => {
                let value = field.text().await.map_err(AppError::from_multipart)?;
                declared.declare(field_name, value.trim().to_string());
            }
            None => tracing::debug!(field = %field_name, "ignoring unrecognized form field"),
        }
    }

    for part in &staged {
        let claimed = declared.take_for(part);
        check_declared_digest(part, claimed.as_deref(), verify)?;
    }

    let mut summary = UploadSummary::default();
    for part in staged {
        store.commit(part.file, &part.name).map_err(|e| {
            AppError::Storage(format!("failed to store {}: {e}", part.name))
        })?;
        tracing::info!(file = %part.name, bytes = part.bytes, digest = %part.digest, "stored");
        summary.bytes += part.bytes;
        summary.files.push(part.name.into_string());
    }
    Ok(summary)
}

/// Stored name for a part. Clients may send a path; only its last segment
/// is kept, whichever separator style it uses.
fn part_name(raw: &str) -> Result<StoredName, AppError> {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    StoredName::new(base).map_err(|e| AppError::BadRequest(format!("invalid file name: {e}")))
}

async fn stage_part(
    store: &FileStore,
    field_name: String,
    name: StoredName,
    mut field: Field<'_>,
) -> Result<StagedPart, AppError> {
    let storage_err = |e: std::io::Error| AppError::Storage(format!("failed to stage {name}: {e}"));

    let file = store.stage().map_err(storage_err)?;
    let handle = file.as_file().try_clone().map_err(storage_err)?;
    let mut out = tokio::fs::File::from_std(handle);
    let mut hasher = StreamingHasher::new();
    let mut bytes = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(AppError::from_multipart)? {
        hasher.update(&chunk);
        out.write_all(&chunk).await.map_err(storage_err)?;
        bytes += chunk.len() as u64;
    }
    out.flush().await.map_err(storage_err)?;
    out.sync_all().await.map_err(storage_err)?;

    let digest = hasher.finalize();
    tracing::debug!(file = %name, bytes, digest = %digest, "staged upload part");
    Ok(StagedPart {
        field_name,
        name,
        file,
        digest,
        bytes,
    })
}

/// Digest fields seen in the body, queued per field name in arrival order.
///
/// A batch may carry several parts with the same name, each followed by its
/// own `sha256_<name>` field; queuing pairs them up in order instead of
/// letting the last field win.
#[derive(Debug, Default)]
struct DeclaredDigests {
    by_field: HashMap<String, VecDeque<String>>,
}

impl DeclaredDigests {
    fn declare(&mut self, field_name: String, value: String) {
        self.by_field.entry(field_name).or_default().push_back(value);
    }

    /// The next digest declared for `part`. Clients key the field by the
    /// stored name or by the part's field name, so both are tried.
    fn take_for(&mut self, part: &StagedPart) -> Option<String> {
        [
            digest_field_name(part.name.as_str()),
            digest_field_name(&part.field_name),
        ]
        .iter()
        .find_map(|key| self.by_field.get_mut(key).and_then(VecDeque::pop_front))
    }
}

fn check_declared_digest(
    part: &StagedPart,
    claimed: Option<&str>,
    verify: bool,
) -> Result<(), AppError> {
    let Some(claimed) = claimed else {
        tracing::debug!(file = %part.name, "no digest declared for part");
        return Ok(());
    };

    let matches = ContentDigest::from_hex(claimed).is_ok_and(|d| d == part.digest);
    if matches {
        return Ok(());
    }
    if !verify {
        tracing::warn!(file = %part.name, declared = %claimed, actual = %part.digest,
            "declared digest does not match upload, verification disabled");
        return Ok(());
    }
    Err(AppError::DigestMismatch {
        file_name: part.name.to_string(),
        declared: claimed.to_string(),
        actual: part.digest.to_hex(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_name_keeps_last_segment() {
        assert_eq!(part_name("a.txt").unwrap().as_str(), "a.txt");
        assert_eq!(part_name("/tmp/dir/a.txt").unwrap().as_str(), "a.txt");
        assert_eq!(part_name("C:\\docs\\b.md").unwrap().as_str(), "b.md");
    }

    #[test]
    fn part_name_rejects_unusable_names() {
        assert!(matches!(part_name("dir/"), Err(AppError::BadRequest(_))));
        assert!(matches!(part_name(".."), Err(AppError::BadRequest(_))));
        assert!(matches!(part_name(""), Err(AppError::BadRequest(_))));
    }

    fn staged(dir: &tempfile::TempDir, data: &[u8]) -> StagedPart {
        let store = FileStore::new(dir.path());
        StagedPart {
            field_name: "/home/u/a.txt".into(),
            name: StoredName::new("a.txt").unwrap(),
            file: store.stage().unwrap(),
            digest: fstore_core::sha256_bytes(data),
            bytes: data.len() as u64,
        }
    }

    fn declared(fields: &[(&str, &str)]) -> DeclaredDigests {
        let mut d = DeclaredDigests::default();
        for (field, value) in fields {
            d.declare(field.to_string(), value.to_string());
        }
        d
    }

    #[test]
    fn declared_digest_matches_by_either_key() {
        let dir = tempfile::tempdir().unwrap();
        let part = staged(&dir, b"hello");
        let hex = fstore_core::sha256_bytes(b"hello").to_hex();

        let claimed = declared(&[("sha256_a.txt", hex.as_str())]).take_for(&part);
        assert!(check_declared_digest(&part, claimed.as_deref(), true).is_ok());

        let upper = hex.to_uppercase();
        let claimed = declared(&[("sha256_/home/u/a.txt", upper.as_str())]).take_for(&part);
        assert_eq!(claimed.as_deref(), Some(upper.as_str()));
        assert!(check_declared_digest(&part, claimed.as_deref(), true).is_ok());

        assert!(check_declared_digest(&part, None, true).is_ok());
    }

    #[test]
    fn repeated_name_pairs_digests_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = staged(&dir, b"first");
        let second = staged(&dir, b"second");
        let (d1, d2) = (
            fstore_core::sha256_bytes(b"first").to_hex(),
            fstore_core::sha256_bytes(b"second").to_hex(),
        );
        let mut digests = declared(&[("sha256_a.txt", d1.as_str()), ("sha256_a.txt", d2.as_str())]);

        let claimed = digests.take_for(&first);
        assert!(check_declared_digest(&first, claimed.as_deref(), true).is_ok());
        let claimed = digests.take_for(&second);
        assert!(check_declared_digest(&second, claimed.as_deref(), true).is_ok());
        assert_eq!(digests.take_for(&second), None);
    }

    #[test]
    fn mismatch_rejected_only_when_verifying() {
        let dir = tempfile::tempdir().unwrap();
        let part = staged(&dir, b"hello");
        let wrong = fstore_core::sha256_bytes(b"other").to_hex();

        let err = check_declared_digest(&part, Some(wrong.as_str()), true).unwrap_err();
        assert!(matches!(err, AppError::DigestMismatch { ref file_name, .. } if file_name == "a.txt"));
        assert!(check_declared_digest(&part, Some(wrong.as_str()), false).is_ok());
        assert!(check_declared_digest(&part, Some("zz"), true).is_err());
    }
}
