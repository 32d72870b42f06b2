//! # fstore-core — Foundational Types for fstore
//!
//! Shared by the server, the client, and the CLI:
//!
//! - **Content digests** ([`ContentDigest`]) and the SHA-256 hasher used to
//!   decide file identity independently of file names.
//! - **Wire protocol** types for the `/files` endpoint, serialized with the
//!   exact JSON field names the protocol uses.
//! - **Stored names** ([`StoredName`]): the flat, separator-free names under
//!   which files live in the server's storage root.

pub mod digest;
pub mod error;
pub mod name;
pub mod protocol;

pub use digest::{sha256_bytes, sha256_file, sha256_reader, ContentDigest, StreamingHasher};
pub use error::{DigestError, NameError};
pub use name::{base_name, is_staging_name, StoredName, STAGING_PREFIX};
pub use protocol::{
    Action, FileDeletionResponse, FileHashPair, FileList, FileNameErrorPair,
    TryWithSha256Request, TryWithSha256Response, WordCountPair, WordCountResponse,
};
