//! # fstore-cli — `store-client` command-line tool
//!
//! ## Subcommands
//!
//! - `store-client add FILE...` / `update FILE...`: store or replace files,
//!   sending only content the server does not already hold.
//! - `store-client ls`: numbered listing of stored files.
//! - `store-client rm NAME...`: delete stored files.
//! - `store-client wc`: total word count across stored files.
//! - `store-client freq-words`: most frequent words.
//!
//! Every handler writes its report to the given writers and returns the
//! process exit code: 0 when everything requested succeeded, 1 when any
//! item was left undone. Transport and server errors propagate as `Err`.

pub mod files;
pub mod stats;
