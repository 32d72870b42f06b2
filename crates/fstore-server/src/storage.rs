//! # Storage Root
//!
//! [`FileStore`] owns the flat directory that holds every stored file. All
//! filesystem access on the server goes through it.
//!
//! ## Write discipline
//!
//! Stored files are never written in place. New content is staged in an
//! exclusively-created temp file inside the root (named with
//! [`STAGING_PREFIX`]) and then renamed onto its destination. The rename is
//! atomic, so a reader sees either the old bytes or the new bytes, never a
//! mix. Commits to the same name are additionally serialized through an
//! in-process lock keyed by name; concurrent writers resolve to last-writer-
//! wins with each writer's content intact.
//!
//! Staged files are invisible to [`FileStore::regular_files`] and so to
//! listing, the dedup index, and word statistics.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use fstore_core::{is_staging_name, ContentDigest, StoredName, StreamingHasher, STAGING_PREFIX};
use fstore_core::protocol::FileNameErrorPair;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;

const COPY_CHUNK: usize = 64 * 1024;

/// Errors from storage root operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {name}: {source}")]
    Io { name: String, source: io::Error },

    /// A copy source no longer hashed to the digest it was indexed under.
    #[error("content of {name} no longer matches digest {expected}")]
    ContentChanged { name: String, expected: ContentDigest },
}

impl StorageError {
    fn io(name: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let name = name.into();
        move |source| Self::Io { name, source }
    }
}

/// Per-name mutual exclusion for commits into the root.
#[derive(Debug, Default)]
struct NameLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NameLocks {
    fn with_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        // Clone the Arc out so the map shard is released before blocking.
        let lock = self.locks.entry(name.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // The map's own handle is the last one once no caller holds the name.
        self.locks.remove_if(name, |_, l| Arc::strong_count(l) == 1);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Handle to the storage root. Cheap to clone; clones share the lock table.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    locks: Arc<NameLocks>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(NameLocks::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &StoredName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Regular, non-staging files in the root as `(name, path)` pairs,
    /// sorted by name. Symlinks, directories, and names that are not valid
    /// UTF-8 are skipped.
    pub fn regular_files(&self) -> io::Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(file = ?entry.file_name(), "skipping non-UTF-8 file name");
                continue;
            };
            if is_staging_name(&name) {
                continue;
            }
            files.push((name, entry.path()));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Names of all stored files, sorted.
    pub fn list(&self) -> io::Result<Vec<String>> {
        Ok(self
            .regular_files()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Delete each named file. Returns the names that could not be
    /// deleted, with the reason; the rest of the batch is unaffected.
    pub fn delete(&self, names: &[String]) -> Vec<FileNameErrorPair> {
        let mut failures = Vec::new();
        for raw in names {
            if let Err(error_msg) = self.delete_one(raw) {
                tracing::warn!(file = %raw, error = %error_msg, "delete failed");
                failures.push(FileNameErrorPair {
                    file_name: raw.clone(),
                    error_msg,
                });
            } else {
                tracing::info!(file = %raw, "deleted");
            }
        }
        failures
    }

    fn delete_one(&self, raw: &str) -> Result<(), String> {
        let name = StoredName::new(raw).map_err(|e| e.to_string())?;
        let path = self.path_of(&name);
        self.locks.with_lock(name.as_str(), || {
            let meta = fs::symlink_metadata(&path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => format!("{name}: file does not exist"),
                _ => format!("{name}: {e}"),
            })?;
            if !meta.is_file() {
                return Err(format!("{name}: not a regular file"));
            }
            fs::remove_file(&path).map_err(|e| format!("{name}: {e}"))
        })
    }

    /// Create an empty staging file inside the root.
    pub fn stage(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.root)
    }

    /// Atomically move a staged file onto `name`, replacing any existing
    /// file of that name.
    pub fn commit(&self, staged: NamedTempFile, name: &StoredName) -> Result<(), StorageError> {
        let dest = self.path_of(name);
        self.locks.with_lock(name.as_str(), || {
            staged
                .persist(&dest)
                .map(|_| ())
                .map_err(|e| StorageError::Io {
                    name: name.to_string(),
                    source: e.error,
                })
        })
    }

    /// Copy stored file `source` to `dest`, verifying on the fly that the
    /// bytes copied still hash to `expected`. Nothing is committed unless the
    /// whole copy succeeds and the digest matches.
    pub fn copy_verified(
        &self,
        source: &str,
        dest: &StoredName,
        expected: &ContentDigest,
    ) -> Result<u64, StorageError> {
        let src_path = self.root.join(source);
        let src = File::open(&src_path).map_err(StorageError::io(source))?;
        let mut staged = self.stage().map_err(StorageError::io(dest.as_str()))?;

        let (copied, digest) = copy_hashing(BufReader::new(src), staged.as_file_mut())
            .map_err(StorageError::io(dest.as_str()))?;
        if digest != *expected {
            return Err(StorageError::ContentChanged {
                name: source.to_string(),
                expected: *expected,
            });
        }
        staged
            .as_file()
            .sync_all()
            .map_err(StorageError::io(dest.as_str()))?;
        self.commit(staged, dest)?;
        Ok(copied)
    }

    /// Whether a file can be created in the root right now.
    pub fn is_writable(&self) -> bool {
        self.stage().is_ok()
    }
}

fn copy_hashing<R: Read, W: Write>(mut reader: R, writer: &mut W) -> io::Result<(u64, ContentDigest)> {
    let mut hasher = StreamingHasher::new();
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok((total, hasher.finalize()))
}
