//! Storage backend trait and implementations.
//!
//! [`StorageBackend`] is the seam between the synchronization engine and the
//! filesystem: the pointer-file writer, the tree walk used by orphan cleanup
//! and the existing-media scan all go through it.

mod dry_run;
mod filter;
mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::dry_run::DryRunBackend;
pub use self::filter::ExtensionFilterBackend;
pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and are validated with
/// [`validate_path`](crate::validate_path) by every implementation.
///
/// # Examples
///
/// ```
/// use futures::TryStreamExt;
/// use std::path::Path;
/// use strm_storage::{backend::StorageBackend, error::Result};
///
/// async fn refresh(backend: &dyn StorageBackend, path: &Path, url: &str) -> Result<usize> {
///     backend.write(path, format!("{url}\n").as_bytes()).await?;
///     let files: Vec<_> = backend.list_stream(path.parent()).try_collect().await?;
///     Ok(files.len())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging.
    fn name(&self) -> &str;

    /// Stream file metadata matching an optional prefix.
    ///
    /// Errors for individual entries are yielded in-line; the stream keeps
    /// going afterwards. Listing a prefix that doesn't exist yields nothing.
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use strm_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(None);
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Write file contents, replacing any existing file.
    ///
    /// Implementations create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Resolve a storage path to the absolute location it refers to.
    ///
    /// The file does not need to exist. Two storage paths referring to the
    /// same file always resolve to the same location, which makes the result
    /// suitable for persisting and comparing across runs.
    fn locate(&self, path: &Path) -> Result<PathBuf>;

    /// Remove directories left empty (for example after orphan cleanup).
    /// Returns how many were removed. Backends without real directories
    /// have nothing to do.
    async fn prune_empty_dirs(&self) -> Result<u64> {
        Ok(0)
    }
}
