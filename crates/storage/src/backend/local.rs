//! Local filesystem storage backend.
//!
//! Files live under a configured root directory and are accessed through
//! `tokio::fs`.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// All paths are relative to the root directory, which is created if missing
/// and canonicalized on construction so that [`locate`](StorageBackend::locate)
/// returns stable absolute paths.
///
/// ```no_run
/// use strm_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("output", "/srv/media/strm")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend rooted at an absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is relative
    /// or exists but is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Sync on purpose: this happens once, during start-up.
            std::fs::create_dir_all(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        let root = std::fs::canonicalize(&root).map_err(|e| Self::map_io_error(e, &root))?;
        Ok(Self { name: name.into(), root })
    }

    /// Like [`new`](Self::new), but the root must already exist. Used for
    /// read-only media directories which should never be created implicitly.
    pub fn existing(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            exn::bail!(ErrorKind::NotFound(root.to_path_buf()));
        }
        Self::new(name, root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute
            .strip_prefix(&self.root)
            .or_raise(|| ErrorKind::OutsideRoot { path: absolute.to_path_buf(), root: self.root.clone() })?;
        Ok(validate_path(relative)?)
    }

    fn file_info(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Classifies one directory entry; keeps the `?`-heavy logic out of the
    /// stream body, where errors have to be yielded instead.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        // Symlinks are never followed. An alias path never matches what
        // `locate` returned for the real file, and a link may leave the root.
        let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &path))?;
        if file_type.is_symlink() {
            tracing::trace!(path = %path.display(), "Skipping symlink");
            return Ok(WalkEntry::Skip);
        }
        let relative = self.relative_path(&path)?;
        if file_type.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if !file_type.is_file() {
            return Ok(WalkEntry::Skip);
        }
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            // Removed between read_dir and stat.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalkEntry::Skip),
            Err(e) => exn::bail!(Self::map_io_error(e, &path)),
        };
        Ok(WalkEntry::File(Self::file_info(&relative, metadata)?))
    }

    /// Post-order removal of empty directories below `dir`, never removing
    /// the root itself.
    async fn prune_dir(&self, dir: PathBuf) -> Result<u64> {
        let mut stack = vec![(dir, false)];
        let mut removed = 0u64;
        while let Some((current, visited)) = stack.pop() {
            if visited {
                let mut entries = fs::read_dir(&current).await.map_err(|e| Self::map_io_error(e, &current))?;
                let is_empty = entries.next_entry().await.map_err(ErrorKind::Io)?.is_none();
                if is_empty && current != self.root {
                    fs::remove_dir(&current).await.map_err(|e| Self::map_io_error(e, &current))?;
                    removed += 1;
                }
                continue;
            }
            stack.push((current.clone(), true));
            let mut entries = fs::read_dir(&current).await.map_err(|e| Self::map_io_error(e, &current))?;
            while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
                if entry.file_type().await.map_err(ErrorKind::Io)?.is_dir() {
                    stack.push((entry.path(), false));
                }
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        // Start from the prefix's parent so that a prefix naming a file (or a
        // directory that doesn't exist yet) is not an error.
        let start_dir = validated_prefix
            .as_ref()
            .map(|prefix| self.root.join(prefix).parent().unwrap_or(&self.root).to_path_buf())
            .unwrap_or_else(|| self.root.clone());
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A missing directory lists as empty.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'dirs; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    fn locate(&self, path: &Path) -> Result<PathBuf> {
        self.absolute_path(path)
    }

    async fn prune_empty_dirs(&self) -> Result<u64> {
        let removed = self.prune_dir(self.root.clone()).await?;
        if removed > 0 {
            tracing::debug!(backend = self.name, removed, "Pruned empty directories");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn setup() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("output", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("output", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("output", "relative/path").is_err());
    }

    #[test]
    fn test_existing_requires_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let err = LocalBackend::existing("media", &missing).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(!missing.exists());
    }

    #[test]
    fn test_locate_is_absolute_and_normalized() {
        let (dir, backend) = setup();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        let located = backend.locate(Path::new("Movies/./Heat/../Heat/Heat.strm")).unwrap();
        assert_eq!(located, root.join("Movies/Heat/Heat.strm"));
        assert!(backend.locate(Path::new("../escape.strm")).is_err());
    }

    async fn listed(backend: &LocalBackend, prefix: Option<&Path>) -> Vec<PathBuf> {
        let mut paths: Vec<_> = backend.list_stream(prefix).map_ok(|f| f.path).try_collect().await.unwrap();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let (dir, backend) = setup();
        let path = Path::new("TV Shows/Show/Season 01/Show S01E01.strm");
        backend.write(path, b"http://example.com/1\n").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join(path)).unwrap(), b"http://example.com/1\n");
        let files: Vec<_> = backend.list_stream(None).try_collect().await.unwrap();
        assert_eq!(files[0].size, 21);
    }

    #[tokio::test]
    async fn test_list_walks_nested_directories() {
        let (_dir, backend) = setup();
        backend.write(Path::new("Movies/A/A.strm"), b"a").await.unwrap();
        backend.write(Path::new("Movies/B/B.strm"), b"b").await.unwrap();
        backend.write(Path::new("TV Shows/C/Season 01/C S01E01.strm"), b"c").await.unwrap();
        assert_eq!(
            listed(&backend, None).await,
            vec![
                PathBuf::from("Movies/A/A.strm"),
                PathBuf::from("Movies/B/B.strm"),
                PathBuf::from("TV Shows/C/Season 01/C S01E01.strm"),
            ]
        );
        assert_eq!(listed(&backend, Some(Path::new("Movies"))).await.len(), 2);
    }

    #[tokio::test]
    async fn test_list_nonexistent_prefix_is_empty() {
        let (_dir, backend) = setup();
        assert!(listed(&backend, Some(Path::new("nope/"))).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_not_found() {
        let (_dir, backend) = setup();
        backend.write(Path::new("a.strm"), b"x").await.unwrap();
        backend.delete(Path::new("a.strm")).await.unwrap();
        assert!(listed(&backend, None).await.is_empty());
        let err = backend.delete(Path::new("a.strm")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prune_removes_only_empty_directories() {
        let (dir, backend) = setup();
        backend.write(Path::new("Movies/Kept/Kept.strm"), b"x").await.unwrap();
        backend.write(Path::new("Movies/Gone/Gone.strm"), b"x").await.unwrap();
        backend.delete(Path::new("Movies/Gone/Gone.strm")).await.unwrap();
        std::fs::create_dir_all(dir.path().join("TV Shows/Empty/Season 01")).unwrap();
        let removed = backend.prune_empty_dirs().await.unwrap();
        assert_eq!(removed, 4);
        assert!(dir.path().join("Movies/Kept/Kept.strm").exists());
        assert!(!dir.path().join("Movies/Gone").exists());
        assert!(!dir.path().join("TV Shows").exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_dir, backend) = setup();
        assert!(backend.locate(Path::new("../etc/passwd")).is_err());
        assert!(backend.write(Path::new("../escape.strm"), b"data").await.is_err());
        assert!(backend.delete(Path::new("../../file")).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_does_not_follow_symlinks() {
        let (dir, backend) = setup();
        let elsewhere = tempfile::tempdir().unwrap();
        std::fs::write(elsewhere.path().join("Foreign.strm"), b"x").unwrap();
        backend.write(Path::new("Movies/Heat/Heat.strm"), b"x").await.unwrap();
        std::os::unix::fs::symlink(dir.path().join("Movies"), dir.path().join("Alias")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("Linked")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("Movies/Heat/Heat.strm"), dir.path().join("Heat.strm")).unwrap();

        assert_eq!(listed(&backend, None).await, vec![PathBuf::from("Movies/Heat/Heat.strm")]);
        assert_eq!(backend.prune_empty_dirs().await.unwrap(), 0);
        assert!(elsewhere.path().join("Foreign.strm").exists());
    }
}
