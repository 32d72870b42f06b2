//! # Dedup Index and Resolver
//!
//! Server half of the dedup negotiation. For every `try_with_sha256` request
//! the storage root is scanned and hashed into a fresh [`DedupIndex`]; each
//! offered `(name, digest)` pair is then resolved against that snapshot:
//!
//! | Index lookup | Outcome | Reported back? |
//! |--------------|---------|----------------|
//! | digest unknown | [`NegotiationOutcome::Absent`] | yes |
//! | digest held under the requested name | [`NegotiationOutcome::AlreadyPresent`] | no |
//! | digest held under other names | copy → [`NegotiationOutcome::Copied`] | no |
//! | copy failed, bad name, bad digest | [`NegotiationOutcome::Rejected`] | yes |
//!
//! Nothing is cached between requests. Because the snapshot predates the
//! batch, a copy made for one pair never becomes a source for a later pair
//! of the same batch.

use std::collections::{BTreeSet, HashMap};

use fstore_core::{sha256_file, ContentDigest, FileHashPair, StoredName, TryWithSha256Response};

use crate::storage::FileStore;

/// Snapshot of `digest -> names holding that content` for the storage root.
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    by_digest: HashMap<ContentDigest, BTreeSet<String>>,
}

impl DedupIndex {
    /// Scan and hash every regular file in the root. Files that cannot be
    /// read are left out of the index.
    pub fn build(store: &FileStore) -> std::io::Result<Self> {
        let mut index = Self::default();
        for (name, path) in store.regular_files()? {
            match sha256_file(&path) {
                Ok(digest) => {
                    tracing::debug!(file = %name, %digest, "indexed");
                    index.insert(digest, name);
                }
                Err(e) => tracing::warn!(file = %name, error = %e, "skipping unhashable file"),
            }
        }
        tracing::debug!(digests = index.len(), "dedup index built");
        Ok(index)
    }

    pub fn insert(&mut self, digest: ContentDigest, name: String) {
        self.by_digest.entry(digest).or_default().insert(name);
    }

    /// The representative holder of `digest`: the lexicographically
    /// smallest name, so the choice does not depend on directory order.
    pub fn representative(&self, digest: &ContentDigest) -> Option<&str> {
        self.by_digest
            .get(digest)
            .and_then(|names| names.first())
            .map(String::as_str)
    }

    /// Every name holding `digest`, in ascending order.
    pub fn holders(&self, digest: &ContentDigest) -> impl Iterator<Item = &str> {
        self.by_digest
            .get(digest)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    pub fn holds(&self, digest: &ContentDigest, name: &str) -> bool {
        self.by_digest
            .get(digest)
            .is_some_and(|names| names.contains(name))
    }

    /// Number of distinct digests.
    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}

/// What happened to one offered pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// Content already stored under the requested name.
    AlreadyPresent,
    /// Content copied from `from` to the requested name.
    Copied { from: String, bytes: u64 },
    /// No stored file has this digest; the client must upload it.
    Absent,
    /// The shortcut could not apply; the client must upload it.
    Rejected { reason: String },
}

impl NegotiationOutcome {
    /// Resolved pairs need no bytes from the client.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::AlreadyPresent | Self::Copied { .. })
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "already_present",
            Self::Copied { .. } => "copied",
            Self::Absent => "absent",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// One pair together with its outcome.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub pair: FileHashPair,
    pub outcome: NegotiationOutcome,
}

/// Resolve `pairs` in order against `index`.
pub fn resolve(store: &FileStore, index: &DedupIndex, pairs: Vec<FileHashPair>) -> Vec<Resolution> {
    pairs
        .into_iter()
        .map(|pair| {
            let outcome = resolve_one(store, index, &pair);
            tracing::info!(
                file = %pair.file_name,
                digest = %pair.file_hash,
                outcome = outcome.label(),
                "negotiated"
            );
            Resolution { pair, outcome }
        })
        .collect()
}

fn resolve_one(store: &FileStore, index: &DedupIndex, pair: &FileHashPair) -> NegotiationOutcome {
    let name = match StoredName::new(&pair.file_name) {
        Ok(name) => name,
        Err(e) => return NegotiationOutcome::Rejected { reason: e.to_string() },
    };
    let digest = match ContentDigest::from_hex(&pair.file_hash) {
        Ok(digest) => digest,
        Err(e) => return NegotiationOutcome::Rejected { reason: e.to_string() },
    };
    if index.holds(&digest, name.as_str()) {
        return NegotiationOutcome::AlreadyPresent;
    }

    let mut last_error = None;
    for source in index.holders(&digest) {
        match store.copy_verified(source, &name, &digest) {
            Ok(bytes) => {
                return NegotiationOutcome::Copied {
                    from: source.to_string(),
                    bytes,
                }
            }
            Err(e) => {
                tracing::warn!(file = %name, source, error = %e, "dedup copy failed");
                last_error = Some(e.to_string());
            }
        }
    }
    match last_error {
        Some(reason) => NegotiationOutcome::Rejected { reason },
        None => NegotiationOutcome::Absent,
    }
}

/// The wire response: every pair that was not resolved, unchanged and in
/// input order.
pub fn unresolved(resolutions: &[Resolution]) -> TryWithSha256Response {
    TryWithSha256Response {
        unsuccessful_file_names: resolutions
            .iter()
            .filter(|r| !r.outcome.is_resolved())
            .map(|r| r.pair.clone())
            .collect(),
    }
}
