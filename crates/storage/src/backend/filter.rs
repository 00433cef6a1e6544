//! Extension-filtered storage backend decorator.
//!
//! Wraps another backend and restricts all operations to files whose final
//! extension is in a configured set, e.g. `strm` for the pointer tree or the
//! usual video containers for a media library.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{BackendHandle, StorageBackend, error::Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Extension-filtered storage backend.
///
/// Paths without one of the allowed extensions return
/// [`ErrorKind::FilteredPath`], and are left out of listings. Extensions are
/// compared case-insensitively and may be given with or without a leading
/// dot.
///
/// ```
/// use std::sync::Arc;
/// use strm_storage::backend::{ExtensionFilterBackend, LocalBackend};
///
/// # fn example(root: &std::path::Path) -> strm_storage::error::Result<()> {
/// let local = LocalBackend::new("output", root)?;
/// let pointers = ExtensionFilterBackend::new(Arc::new(local), [".strm"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ExtensionFilterBackend {
    inner: BackendHandle,
    extensions: HashSet<String>,
}
impl ExtensionFilterBackend {
    pub fn new(inner: BackendHandle, extensions: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { inner, extensions }
    }

    fn is_allowed(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    fn check(&self, path: &Path) -> Result<()> {
        if !self.is_allowed(path) {
            exn::bail!(ErrorKind::FilteredPath(path.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for ExtensionFilterBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        Box::pin(self.inner.list_stream(prefix).filter(|item| {
            std::future::ready(match item {
                Ok(info) => self.is_allowed(&info.path),
                Err(_) => true,
            })
        }))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.check(path)?;
        self.inner.write(path, data).await
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.check(path)?;
        self.inner.delete(path).await
    }

    fn locate(&self, path: &Path) -> Result<PathBuf> {
        self.check(path)?;
        self.inner.locate(path)
    }

    async fn prune_empty_dirs(&self) -> Result<u64> {
        self.inner.prune_empty_dirs().await
    }
}
