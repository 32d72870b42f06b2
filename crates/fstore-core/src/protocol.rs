//! # `/files` Wire Protocol
//!
//! JSON bodies and query vocabulary shared by server and client. Field names
//! are fixed by the protocol (note the capitalized `Files`, `Word`, `Count`),
//! so every struct pins them with `serde(rename)` rather than relying on a
//! case convention.
//!
//! | Exchange | Request | Response |
//! |----------|---------|----------|
//! | Dedup negotiation | [`TryWithSha256Request`] | [`TryWithSha256Response`] |
//! | List | – | [`FileList`] |
//! | Delete | [`FileList`] | [`FileDeletionResponse`] |
//! | Frequent words | – | [`WordCountResponse`] |
//!
//! Digests travel as hex strings, not [`ContentDigest`](crate::ContentDigest):
//! a malformed digest in one pair must not make the whole batch
//! undecodable, and unresolved pairs are echoed back byte-for-byte.

use serde::{Deserialize, Serialize};

/// Path of the single resource endpoint.
pub const FILES_PATH: &str = "/files";

/// Query parameter selecting a non-default operation.
pub const ACTION_PARAM: &str = "action";

/// Multipart field carrying the hex digest of the file part `name`.
pub const DIGEST_FIELD_PREFIX: &str = "sha256_";

/// Number of entries returned by the frequent-words action.
pub const FREQ_WORDS_LIMIT: usize = 10;

/// Operations selected by `?action=`. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Dedup negotiation (POST/PUT).
    TryWithSha256,
    /// Total word count (GET).
    WordCount,
    /// Top-N frequent words (GET).
    FreqWords,
}

impl Action {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "try_with_sha256" => Some(Self::TryWithSha256),
            "wc" => Some(Self::WordCount),
            "freq-words" => Some(Self::FreqWords),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TryWithSha256 => "try_with_sha256",
            Self::WordCount => "wc",
            Self::FreqWords => "freq-words",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the multipart text field carrying `file_name`'s digest.
pub fn digest_field_name(file_name: &str) -> String {
    format!("{DIGEST_FIELD_PREFIX}{file_name}")
}

/// A proposed name paired with the hex digest of its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHashPair {
    pub file_name: String,
    pub file_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryWithSha256Request {
    #[serde(default)]
    pub file_sha256_pairs: Vec<FileHashPair>,
}

/// The pairs the server could not resolve by content match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryWithSha256Response {
    #[serde(default)]
    pub unsuccessful_file_names: Vec<FileHashPair>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    #[serde(rename = "Files", default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNameErrorPair {
    pub file_name: String,
    pub error_msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeletionResponse {
    #[serde(default)]
    pub unsuccessful_file_names: Vec<FileNameErrorPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountPair {
    #[serde(rename = "Word")]
    pub word: String,
    #[serde(rename = "Count")]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountResponse {
    #[serde(default)]
    pub word_count_pairs: Vec<WordCountPair>,
}
