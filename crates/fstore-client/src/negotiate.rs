//! Client half of the dedup negotiation.
//!
//! Each candidate path is hashed locally and offered to the server under
//! its base name. The server answers with the pairs it could not resolve;
//! every local path whose digest appears in that answer still needs a bulk
//! upload. A digest shared by several local paths sends all of them.
//!
//! Negotiation never blocks an upload:
//!
//! - a path that cannot be hashed is kept for upload without being offered;
//! - a transport error, non-2xx status, or undecodable response abandons
//!   the negotiation and keeps every candidate for upload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use fstore_core::protocol::{
    Action, FileHashPair, TryWithSha256Request, TryWithSha256Response, ACTION_PARAM,
};
use fstore_core::{base_name, sha256_file};

use crate::StoreClient;

const ENDPOINT: &str = "POST /files?action=try_with_sha256";

/// How a batch of candidates came out of negotiation. Every candidate is in
/// exactly one of `resolved` and `pending`, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationReport {
    /// Stored by the server from content it already held.
    pub resolved: Vec<PathBuf>,
    /// Still to be sent by bulk upload.
    pub pending: Vec<PathBuf>,
    /// Could not be hashed locally. Also listed in `pending`.
    pub unhashed: Vec<PathBuf>,
    /// The exchange failed and every candidate was kept for upload.
    pub fell_back: bool,
}

type Hashed = Result<FileHashPair, String>;

impl NegotiationReport {
    fn fall_back(paths: &[PathBuf], hashed: &[Hashed]) -> Self {
        Self {
            resolved: Vec::new(),
            pending: paths.to_vec(),
            unhashed: unhashed_paths(paths, hashed),
            fell_back: true,
        }
    }

    fn classify(paths: &[PathBuf], hashed: &[Hashed], response: &TryWithSha256Response) -> Self {
        let unresolved: HashSet<String> = response
            .unsuccessful_file_names
            .iter()
            .map(|p| p.file_hash.trim().to_ascii_lowercase())
            .collect();

        let mut report = Self::default();
        for (path, pair) in paths.iter().zip(hashed) {
            match pair {
                Err(_) => {
                    report.unhashed.push(path.clone());
                    report.pending.push(path.clone());
                }
                Ok(pair) if unresolved.contains(&pair.file_hash) => {
                    report.pending.push(path.clone());
                }
                Ok(_) => report.resolved.push(path.clone()),
            }
        }
        report
    }
}

fn unhashed_paths(paths: &[PathBuf], hashed: &[Hashed]) -> Vec<PathBuf> {
    paths
        .iter()
        .zip(hashed)
        .filter(|(_, h)| h.is_err())
        .map(|(p, _)| p.clone())
        .collect()
}

/// The pair offered for `path`: its base name and lowercase hex digest.
pub(crate) fn offer_for(path: &Path) -> Hashed {
    let file_name =
        base_name(path).ok_or_else(|| format!("{} has no usable file name", path.display()))?;
    let digest = sha256_file(path).map_err(|e| e.to_string())?;
    Ok(FileHashPair {
        file_name,
        file_hash: digest.to_hex(),
    })
}

impl StoreClient {
    /// Offer `paths` to the server by content digest and report which still
    /// need uploading. Never fails; see the module docs for the fallbacks.
    pub async fn negotiate(&self, paths: &[PathBuf]) -> NegotiationReport {
        let owned = paths.to_vec();
        let hashed = match tokio::task::spawn_blocking(move || {
            owned.iter().map(|p| offer_for(p)).collect::<Vec<_>>()
        })
        .await
        {
            Ok(hashed) => hashed,
            Err(e) => {
                tracing::warn!("hashing task failed, uploading every file: {e}");
                let unknown: Vec<Hashed> = paths.iter().map(|_| Err(e.to_string())).collect();
                return NegotiationReport::fall_back(paths, &unknown);
            }
        };

        let mut offers = Vec::new();
        for (path, pair) in paths.iter().zip(&hashed) {
            match pair {
                Ok(pair) => offers.push(pair.clone()),
                Err(reason) => {
                    tracing::warn!(file = %path.display(), "cannot hash, will upload without negotiation: {reason}");
                }
            }
        }
        if offers.is_empty() {
            return NegotiationReport {
                pending: paths.to_vec(),
                unhashed: unhashed_paths(paths, &hashed),
                ..NegotiationReport::default()
            };
        }

        let request = TryWithSha256Request {
            file_sha256_pairs: offers,
        };
        let response: TryWithSha256Response = match self
            .send_json(ENDPOINT, || {
                self.http
                    .post(self.files_url.clone())
                    .query(&[(ACTION_PARAM, Action::TryWithSha256.as_str())])
                    .json(&request)
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "dedup negotiation failed, uploading every file");
                return NegotiationReport::fall_back(paths, &hashed);
            }
        };

        NegotiationReport::classify(paths, &hashed, &response)
    }
}
