//! # Error Types
//!
//! Errors raised by the core primitives. Both use `thiserror` and carry
//! enough context (path, offending value) to be logged without re-wrapping.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from digest computation and parsing.
#[derive(Error, Debug)]
pub enum DigestError {
    /// The input file could not be opened or read to the end.
    #[error("failed to hash {}: {source}", path.display())]
    Io {
        /// File being hashed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A hex digest string was malformed.
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),
}

/// Errors from stored file name validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,

    #[error("file name too long: {0} bytes (max 255)")]
    TooLong(usize),

    /// `.`, `..`, or a name in the server's staging namespace.
    #[error("file name is reserved: {0:?}")]
    Reserved(String),

    #[error("file name {name:?} contains invalid character {ch:?}")]
    InvalidCharacter { name: String, ch: char },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_includes_path() {
        let err = DigestError::Io {
            path: PathBuf::from("/tmp/missing.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.txt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn invalid_character_display() {
        let err = NameError::InvalidCharacter {
            name: "a/b".into(),
            ch: '/',
        };
        assert!(err.to_string().contains("'/'"));
    }

    #[test]
    fn too_long_display() {
        assert!(NameError::TooLong(300).to_string().contains("300"));
    }
}
