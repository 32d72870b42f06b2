//! # HTTP Routes
//!
//! The store exposes a single resource, `/files`. Health probes and
//! `/metrics` are mounted by [`crate::app`].

pub mod files;
