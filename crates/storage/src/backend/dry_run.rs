//! Dry-run storage backend decorator.
//!
//! Listings pass through to the wrapped backend; anything that would change the
//! tree is logged and reported as successful without touching it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result};

/// Dry-run storage backend.
///
/// Wraps another backend and silently drops every mutation, logging an
/// [`info event`](tracing::Event) for each so a dry run still shows what a
/// real run would have done.
#[derive(Clone)]
pub struct DryRunBackend {
    inner: BackendHandle,
}
impl DryRunBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for DryRunBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(path = %path.display(), bytes = data.len(), "Dry run: skipping write");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Dry run: skipping delete");
        Ok(())
    }

    fn locate(&self, path: &Path) -> Result<PathBuf> {
        self.inner.locate(path)
    }

    async fn prune_empty_dirs(&self) -> Result<u64> {
        tracing::info!(backend = self.inner.name(), "Dry run: skipping empty directory pruning");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use futures::TryStreamExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mutations_never_reach_the_inner_backend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kept.strm"), b"http://x/1\n").unwrap();
        std::fs::create_dir(dir.path().join("Empty")).unwrap();
        let inner: BackendHandle = Arc::new(LocalBackend::new("output", dir.path()).unwrap());
        let backend = DryRunBackend::new(inner);

        backend.write(Path::new("new.strm"), b"http://x/2\n").await.unwrap();
        backend.delete(Path::new("kept.strm")).await.unwrap();
        assert_eq!(backend.prune_empty_dirs().await.unwrap(), 0);

        assert!(!dir.path().join("new.strm").exists());
        assert!(dir.path().join("kept.strm").exists());
        assert!(dir.path().join("Empty").exists());
        assert_eq!(std::fs::read(dir.path().join("kept.strm")).unwrap(), b"http://x/1\n");
        let listed: Vec<_> = backend.list_stream(None).try_collect().await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
