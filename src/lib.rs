//! Wayback snapshot harvester library.
//!
//! Queries the Wayback Machine's CDX index for the captures of a URL, keeps
//! one capture per unique content digest, downloads those payloads with a
//! retry/backoff policy, and persists URL and catalog metadata in SQLite.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod db;
pub mod dedup;
pub mod error;
pub mod fs_utils;
pub mod ingest;
pub mod normalize;
pub mod preimport;
pub mod validate;
pub mod wayback;

pub use error::{Error, Result};
