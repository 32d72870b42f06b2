//! # Stored File Names
//!
//! The storage root is flat: a stored file's name is its only key and must
//! never address anything outside the root. [`StoredName`] is the validated
//! form; every server-side path is built from one.
//!
//! Names beginning with [`STAGING_PREFIX`] are reserved for in-flight writes
//! and are invisible to listing, hashing, and word statistics.

use std::fmt;
use std::path::Path;

use crate::error::NameError;

/// Prefix of the temporary files the server stages writes in.
pub const STAGING_PREFIX: &str = ".fstore-staging-";

/// Upper bound matching common filesystem `NAME_MAX`.
pub const MAX_NAME_LEN: usize = 255;

/// A validated stored file name: non-empty, no separators, not reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredName(String);

impl StoredName {
    pub fn new(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong(name.len()));
        }
        if name == "." || name == ".." || is_staging_name(name) {
            return Err(NameError::Reserved(name.to_string()));
        }
        if let Some(ch) = name.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(NameError::InvalidCharacter {
                name: name.to_string(),
                ch,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for StoredName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Whether `name` lives in the server's staging namespace.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

/// The final path segment of a local path, as a UTF-8 string.
///
/// Returns `None` for paths with no final segment (`/`, `..`) or whose final
/// segment is not valid UTF-8.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}
