//! Path validation.
//!
//! Storage paths are always relative to a backend root. [`validate`] resolves
//! `.`/`..` components lexically and rejects anything that would leave the
//! root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a storage path.
///
/// Returns the normalized relative path, or
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath) when the path is
/// empty, contains a null byte, carries a platform prefix, or climbs above
/// the root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use strm_storage::validate_path;
/// assert!(validate_path("Movies/Heat (1995)/Heat (1995).strm").is_ok());
/// assert!(validate_path("TV Shows/../Movies/a.strm").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("/TV Shows//Show/./Season 01/").unwrap(),
///     Path::new("TV Shows/Show/Season 01")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(segment) => {
                // Null bytes survive Path::components() on Unix but truncate
                // paths in syscalls.
                if segment.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(segment);
            },
            // A leading slash is treated as "the backend root".
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}
