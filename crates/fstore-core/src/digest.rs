//! # Content Digest — File Identity by Content
//!
//! Defines [`ContentDigest`], a SHA-256 fingerprint used as the identity of a
//! stored file's bytes, independent of the name it is stored under.
//!
//! ## Invariants
//!
//! - Identical byte sequences always produce equal digests.
//! - A digest is only produced after the whole input has been consumed. A
//!   read failure midway yields an error, never a digest of a prefix.
//! - On the wire a digest is 64 lowercase hex characters. Parsing accepts
//!   either case and surrounding whitespace.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::DigestError;

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

const READ_CHUNK: usize = 64 * 1024;

/// A SHA-256 digest of a byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex digest.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let s = s.trim();
        if s.len() != DIGEST_LEN * 2 {
            return Err(DigestError::InvalidHex(format!(
                "expected {} hex chars, got {}",
                DIGEST_LEN * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_value(c: u8) -> Result<u8, DigestError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(DigestError::InvalidHex(format!(
            "non-hex character {:?}",
            c as char
        ))),
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 for data that arrives in chunks (e.g. an upload
/// stream being written to disk).
#[derive(Clone, Default)]
pub struct StreamingHasher {
    inner: Sha256,
}

impl fmt::Debug for StreamingHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingHasher").finish_non_exhaustive()
    }
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    pub fn finalize(self) -> ContentDigest {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&self.inner.finalize());
        ContentDigest(bytes)
    }
}

/// Digest an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = StreamingHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Digest everything a reader yields, up to EOF.
pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<ContentDigest> {
    let mut hasher = StreamingHasher::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Digest a file's contents without loading it into memory.
pub fn sha256_file(path: &Path) -> Result<ContentDigest, DigestError> {
    let io_err = |source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    sha256_reader(BufReader::new(file)).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn known_vectors() {
        assert_eq!(sha256_bytes(b"hello").to_hex(), HELLO_SHA256);
        assert_eq!(sha256_bytes(b"").to_hex(), EMPTY_SHA256);
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(b"hello"));
    }

    #[test]
    fn file_digest_spanning_several_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(READ_CHUNK * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DigestError::Io { .. }));
    }

    #[test]
    fn reader_failure_yields_no_digest() {
        struct FailAfterFirst(bool);
        impl Read for FailAfterFirst {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0 {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
                }
                self.0 = true;
                buf[0] = b'x';
                Ok(1)
            }
        }
        assert!(sha256_reader(FailAfterFirst(false)).is_err());
    }

    #[test]
    fn hex_roundtrip_and_case_insensitive_parse() {
        let d = sha256_bytes(b"hello");
        assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(
            ContentDigest::from_hex(&HELLO_SHA256.to_uppercase()).unwrap(),
            d
        );
        assert_eq!(format!("{d}"), HELLO_SHA256);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("abc").is_err());
        let bad = "zz".repeat(32);
        assert!(ContentDigest::from_hex(&bad).is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let d = sha256_bytes(b"hello");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{HELLO_SHA256}\""));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut h = StreamingHasher::new();
        h.update(b"hel");
        h.update(b"lo");
        assert_eq!(h.finalize(), sha256_bytes(b"hello"));
    }

    proptest! {
        #[test]
        fn digest_is_stable(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(sha256_bytes(&data), sha256_bytes(&data));
        }

        #[test]
        fn one_byte_change_changes_digest(
            data in proptest::collection::vec(any::<u8>(), 1..2048),
            idx in any::<prop::sample::Index>(),
            delta in 1u8..=255,
        ) {
            let mut modified = data.clone();
            let i = idx.index(modified.len());
            modified[i] = modified[i].wrapping_add(delta);
            prop_assert_ne!(sha256_bytes(&data), sha256_bytes(&modified));
        }
    }
}
