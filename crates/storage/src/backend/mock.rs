//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::StorageBackend;

const MOCK_ROOT: &str = "/mock";

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Paths can be
/// marked as failing to exercise error handling in writers.
///
/// # Examples
///
/// ```
/// use strm_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("Movies/Heat (1995)/Heat (1995).strm", b"http://example.com/heat\n"),
/// ]);
/// backend.write(Path::new("Movies/Up/Up.strm"), b"http://example.com/up\n").await?;
/// assert_eq!(backend.paths().await.len(), 2);
/// assert_eq!(backend.contents("Movies/Up/Up.strm").await.as_deref(), Some(&b"http://example.com/up\n"[..]));
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>>,
    failing: HashSet<PathBuf>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing: HashSet::new(),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make writes and deletes of the given path fail with an I/O error.
    ///
    /// Panics on an invalid path, like [`with_files`](Self::with_files).
    pub fn with_failing(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let Ok(validated) = validate_path(&path) else {
            panic!("MockBackend::with_failing: invalid path {}", path.display());
        };
        self.failing.insert(validated);
        self
    }

    /// Snapshot of every stored path, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.storage.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Contents stored at `path`, if any.
    pub async fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = validate_path(path.as_ref()).ok()?;
        self.storage.read().await.get(&path).map(|(_inserted, data)| data.clone())
    }

    fn check_failing(&self, path: &Path) -> Result<()> {
        if self.failing.contains(path) {
            exn::bail!(ErrorKind::Io(std::io::Error::other(format!("simulated failure: {}", path.display()))));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock; it must not be held across yields.
            let entries: Vec<(PathBuf, OffsetDateTime, u64)> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (inserted, data))| (path.clone(), *inserted, data.len() as u64))
                    .collect()
            };
            for (path, inserted, size) in entries {
                yield Ok(FileInfo::new(path, size, inserted));
            }
        })
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.check_failing(&path)?;
        self.storage.write().await.insert(path, (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.check_failing(&path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    fn locate(&self, path: &Path) -> Result<PathBuf> {
        Ok(Path::new(MOCK_ROOT).join(validate_path(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_write_replaces_contents() {
        let backend = MockBackend::with_files([("a.strm", b"http://x/0\n")]);
        backend.write(Path::new("./a.strm"), b"http://x/1\n").await.unwrap();
        assert_eq!(backend.contents("a.strm").await.unwrap(), b"http://x/1\n");
        assert_eq!(backend.contents("missing.strm").await, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MockBackend::with_files([("file.strm", b"data")]);
        backend.delete(Path::new("file.strm")).await.unwrap();
        assert!(backend.paths().await.is_empty());
        let err = backend.delete(Path::new("file.strm")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failing_paths() {
        let backend = MockBackend::default().with_failing("Movies/Bad/Bad.strm");
        let err = backend.write(Path::new("Movies/Bad/Bad.strm"), b"x").await.unwrap_err();
        assert!(err.is_retryable());
        backend.write(Path::new("Movies/Good/Good.strm"), b"x").await.unwrap();
        assert_eq!(backend.paths().await, vec![PathBuf::from("Movies/Good/Good.strm")]);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([
            ("Movies/A/A.strm", Vec::from(*b"a")),
            ("Movies/B/B.strm", Vec::from(*b"b")),
            ("TV Shows/C/Season 01/C S01E01.strm", Vec::from(*b"c")),
        ]);
        let files: Vec<_> = backend.list_stream(Some(Path::new("Movies"))).try_collect().await.unwrap();
        assert_eq!(files.len(), 2);
        let files: Vec<_> = backend.list_stream(None).try_collect().await.unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_locate_is_rooted() {
        let backend = MockBackend::default();
        assert_eq!(backend.locate(Path::new("./Movies/A.strm")).unwrap(), PathBuf::from("/mock/Movies/A.strm"));
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
