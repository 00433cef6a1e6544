//! Orphan cleanup.
//!
//! Runs after the new pointer cache has replaced the old one: any pointer
//! file in the output tree whose location isn't recorded in the new cache
//! belongs to an entry that is gone (or moved) and is deleted.

use crate::POINTER_EXTENSION;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strm_cache::PointerCache;
use strm_progress::{Outcome, Phase, ProgressTracker};
use strm_storage::BackendHandle;
use strm_storage::backend::ExtensionFilterBackend;
use tracing::instrument;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: u64,
    pub failed: u64,
}

/// Deletes every pointer file under `backend` that `cache` doesn't point at,
/// then prunes directories left empty.
///
/// Failures (listing, resolving or deleting a file) are logged, recorded
/// with the tracker and counted; cleanup always carries on.
#[instrument(skip_all, fields(backend = backend.name(), keep = cache.len()))]
pub async fn remove_orphans(backend: &BackendHandle, cache: &PointerCache, tracker: &ProgressTracker) -> CleanupReport {
    let keep: HashSet<&Path> = cache.values().filter_map(|record| record.path()).collect();
    let pointers: BackendHandle = Arc::new(ExtensionFilterBackend::new(backend.clone(), [POINTER_EXTENSION]));
    let mut report = CleanupReport::default();
    let mut processed = 0u64;

    // Collect first: deleting while the walk is still descending would
    // change the tree under it.
    let mut orphans: Vec<PathBuf> = Vec::new();
    let mut files = pointers.list_stream(None);
    while let Some(item) = files.next().await {
        match item.map(|info| (pointers.locate(&info.path), info.path)) {
            Ok((Ok(location), path)) if keep.contains(location.as_path()) => {
                tracing::trace!(path = %path.display(), "Pointer file still referenced");
            },
            Ok((Ok(_), path)) => orphans.push(path),
            Ok((Err(err), path)) => {
                report.failed += 1;
                fail(tracker, &mut processed, &path.to_string_lossy(), &err);
            },
            Err(err) => {
                report.failed += 1;
                fail(tracker, &mut processed, "", &err);
            },
        }
    }
    drop(files);
    tracker.set_total(Phase::Cleanup, orphans.len() as u64 + report.failed);

    for path in orphans {
        if tracker.is_shutdown_requested() {
            tracing::info!("Shutdown requested, stopping orphan cleanup");
            break;
        }
        let label = path.to_string_lossy();
        match pointers.delete(&path).await {
            Ok(()) => {
                processed += 1;
                report.removed += 1;
                tracing::info!(path = %label, "Removed orphaned pointer file");
                tracker.update_phase(Phase::Cleanup, processed, &label, Outcome::Success);
            },
            Err(err) => {
                report.failed += 1;
                fail(tracker, &mut processed, &label, &err);
            },
        }
    }

    match pointers.prune_empty_dirs().await {
        Ok(0) => {},
        Ok(pruned) => tracing::debug!(pruned, "Removed empty directories"),
        Err(err) => tracing::warn!(error = %err, "Could not prune empty directories"),
    }
    report
}

fn fail(tracker: &ProgressTracker, processed: &mut u64, label: &str, err: &impl std::fmt::Display) {
    *processed += 1;
    tracing::warn!(path = label, error = %err, "Orphan cleanup failed");
    tracker.add_error(format!("Cleanup failed for {label}: {err}"));
    tracker.update_phase(Phase::Cleanup, *processed, label, Outcome::Failure);
}
