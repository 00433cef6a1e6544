//! The synchronization engine.
//!
//! [`pipeline::run`] takes a playlist through every phase of a run: scan local
//! media, parse and deduplicate, classify, reconcile against the cache and
//! write pointer files in batches, then remove orphans. The pieces are usable
//! on their own:
//!
//! - [`scan`]: index local media by identity key.
//! - [`classify`]: run a [`MarketClassifier`] across a bounded pool.
//! - [`reconcile`]: the pure per-entry write/skip/exclude decision.
//! - [`write`]: batched pointer-file writes.
//! - [`cleanup`]: orphan removal.
//! - [`report`]: the excluded entries report.

pub mod classify;
pub mod cleanup;
pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod scan;
mod template;
pub mod write;

pub use crate::classify::{AllowAll, MarketClassifier, Verdict};
pub use crate::template::{PathGenerator, PointerLayout};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strm_storage::BackendHandle;
use strm_storage::backend::{DryRunBackend, LocalBackend};

/// Extension of every pointer file, without the dot.
pub const POINTER_EXTENSION: &str = "strm";
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Everything a run needs besides its collaborators.
pub struct Context {
    /// Where pointer files are written.
    pub output: BackendHandle,
    pub layout: PointerLayout,
    pub batch_size: usize,
    /// Classifier calls in flight at once.
    pub max_workers: usize,
    /// Rewrite pointer files even when the cached record still matches.
    pub force_regenerate: bool,
    pub excluded_report: Option<PathBuf>,
    pub dry_run: bool,
}
impl Context {
    pub fn new(output: BackendHandle, layout: PointerLayout) -> Self {
        Self {
            output,
            layout,
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            force_regenerate: false,
            excluded_report: None,
            dry_run: false,
        }
    }
}

/// Backend for the pointer-file tree at `root`, created if missing. In a dry
/// run, writes and deletes are logged instead of performed.
pub fn output_backend(root: &Path, dry_run: bool) -> Result<BackendHandle> {
    let local: BackendHandle = Arc::new(LocalBackend::new("output", root).or_raise(|| ErrorKind::Storage)?);
    Ok(match dry_run {
        true => Arc::new(DryRunBackend::new(local)),
        false => local,
    })
}
