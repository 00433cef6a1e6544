//! Batched pointer-file writes.

use futures::future;
use std::collections::HashMap;
use std::path::PathBuf;
use strm_playlist::{Category, IdentityKey};
use strm_storage::BackendHandle;
use strm_storage::error::Error as StorageError;
use tracing::instrument;

/// One pointer file to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerWrite {
    pub key: IdentityKey,
    pub category: Category,
    pub url: String,
    /// Relative to the output backend's root.
    pub path: PathBuf,
    /// Absolute location, as recorded in the cache.
    pub location: PathBuf,
}
impl PointerWrite {
    /// The URL followed by a newline.
    pub fn contents(&self) -> Vec<u8> {
        format!("{}\n", self.url.trim()).into_bytes()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PointerWrite>,
    pub failed: Vec<(PointerWrite, StorageError)>,
}

/// Writes one batch of pointer files and reports which made it to disk.
///
/// Writes to different files run concurrently; a failed write doesn't affect
/// the others. Writes sharing a location run one after another in batch
/// order, so the last of them is what ends up on disk.
#[instrument(skip_all, fields(backend = backend.name(), size = ops.len()))]
pub async fn write_batch(backend: &BackendHandle, ops: Vec<PointerWrite>) -> BatchReport {
    let mut lanes: Vec<Vec<PointerWrite>> = Vec::new();
    let mut lane_of: HashMap<PathBuf, usize> = HashMap::new();
    for op in ops {
        match lane_of.get(&op.location) {
            Some(&lane) => lanes[lane].push(op),
            None => {
                lane_of.insert(op.location.clone(), lanes.len());
                lanes.push(vec![op]);
            },
        }
    }

    let results = future::join_all(lanes.into_iter().map(|lane| async move {
        let mut results = Vec::with_capacity(lane.len());
        for op in lane {
            let result = backend.write(&op.path, &op.contents()).await;
            results.push((op, result));
        }
        results
    }))
    .await;

    let mut report = BatchReport::default();
    for (op, result) in results.into_iter().flatten() {
        match result {
            Ok(()) => {
                tracing::debug!(path = %op.location.display(), "Pointer file written");
                report.written.push(op);
            },
            Err(err) => report.failed.push((op, err)),
        }
    }
    report
}
