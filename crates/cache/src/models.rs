use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strm_playlist::{Category, IdentityKey};

/// Local media found by the last scan, by identity key.
pub type ExistingMediaIndex = HashMap<IdentityKey, Category>;
/// The decision recorded for every key in the last completed run.
pub type PointerCache = HashMap<IdentityKey, CacheRecord>;

/// What a previous run decided for one identity key.
///
/// - `allowed` with a path: a pointer file was written there.
/// - `allowed` without a path: satisfied by existing local media.
/// - not `allowed`: excluded by the classifier, never with a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    url: String,
    path: Option<PathBuf>,
    allowed: bool,
}
impl CacheRecord {
    /// Returns [`ErrorKind::Constraint`] for an excluded record with a path.
    pub fn new(url: impl Into<String>, path: Option<PathBuf>, allowed: bool) -> Result<Self> {
        if !allowed && path.is_some() {
            exn::bail!(ErrorKind::Constraint);
        }
        Ok(Self { url: url.into(), path, allowed })
    }

    pub fn written(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { url: url.into(), path: Some(path.into()), allowed: true }
    }

    pub fn existing(url: impl Into<String>) -> Self {
        Self { url: url.into(), path: None, allowed: true }
    }

    pub fn excluded(url: impl Into<String>) -> Self {
        Self { url: url.into(), path: None, allowed: false }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Cache contents as of the start of a run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub existing: ExistingMediaIndex,
    pub pointers: PointerCache,
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
pub(crate) struct ExistingRow {
    pub(crate) key: String,
    pub(crate) category: String,
}
impl TryFrom<ExistingRow> for (IdentityKey, Category) {
    type Error = Error;
    fn try_from(row: ExistingRow) -> Result<Self> {
        let key = row.key.parse::<IdentityKey>().or_raise(|| ErrorKind::InvalidData("identity key"))?;
        let category = row.category.parse::<Category>().or_raise(|| ErrorKind::InvalidData("category"))?;
        Ok((key, category))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PointerRow {
    pub(crate) key: String,
    pub(crate) url: String,
    pub(crate) path: Option<String>,
    pub(crate) allowed: bool,
}
impl TryFrom<PointerRow> for (IdentityKey, CacheRecord) {
    type Error = Error;
    fn try_from(row: PointerRow) -> Result<Self> {
        let key = row.key.parse::<IdentityKey>().or_raise(|| ErrorKind::InvalidData("identity key"))?;
        let record = CacheRecord::new(row.url, row.path.map(PathBuf::from), row.allowed)?;
        Ok((key, record))
    }
}
impl TryFrom<(&IdentityKey, &CacheRecord)> for PointerRow {
    type Error = Error;
    fn try_from((key, record): (&IdentityKey, &CacheRecord)) -> Result<Self> {
        let path = record
            .path()
            .map(|p| p.to_str().ok_or_raise(|| ErrorKind::InvalidData("path")).map(str::to_string))
            .transpose()?;
        Ok(Self {
            key: key.to_string(),
            url: record.url.clone(),
            path,
            allowed: record.allowed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_record_cannot_have_path() {
        let err = CacheRecord::new("http://x/1", Some(PathBuf::from("/out/a.strm")), false).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint));
        assert!(CacheRecord::new("http://x/1", None, false).is_ok());
        assert!(CacheRecord::new("http://x/1", Some(PathBuf::from("/out/a.strm")), true).is_ok());
    }

    #[test]
    fn test_row_to_model() {
        let row = PointerRow {
            key: "movie:heat".to_string(),
            url: "http://x/heat".to_string(),
            path: Some("/out/Movies/Heat (1995)/Heat (1995).strm".to_string()),
            allowed: true,
        };
        let (key, record) = <(IdentityKey, CacheRecord)>::try_from(row).unwrap();
        assert_eq!(key.as_str(), "movie:heat");
        assert_eq!(record.path(), Some(Path::new("/out/Movies/Heat (1995)/Heat (1995).strm")));
    }

    #[test]
    fn test_row_with_bad_key_is_invalid_data() {
        let row = ExistingRow { key: "nonsense".to_string(), category: "MOVIE".to_string() };
        let err = <(IdentityKey, Category)>::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("identity key")));
    }

    #[test]
    fn test_existing_row_accepts_legacy_category() {
        let row = ExistingRow { key: "tv:show:s01e02".to_string(), category: "TVEPISODE".to_string() };
        let (_, category) = <(IdentityKey, Category)>::try_from(row).unwrap();
        assert_eq!(category, Category::TvShow);
    }
}
