//! Storage backends for the pointer-file output tree and local media
//! directories.
//!
//! Every backend speaks paths relative to its own root, validated by
//! [`validate_path`] so nothing escapes that root.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
