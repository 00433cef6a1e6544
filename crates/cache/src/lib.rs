//! SQLite cache of prior reconciliation decisions.
//!
//! The cache is not the source of truth for what exists on disk; it records
//! what the last completed run decided, so the next run can skip unchanged
//! work and find pointer files that are no longer wanted.
//!
//! # Tables
//! - **existing media**: identity keys of media already present locally,
//!   rebuilt by a full rescan every run.
//! - **pointer cache**: one [`CacheRecord`] per identity key. Replaced as a
//!   whole at the end of a run; keys that disappear are retired, and their
//!   pointer files become orphans.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{CacheRecord, ExistingMediaIndex, PointerCache, Snapshot};
pub use crate::repo::Repository;
pub use strm_playlist::IdentityKey;
