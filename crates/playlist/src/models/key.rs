use derive_more::Display;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

pub(crate) const MOVIE_NAMESPACE: &str = "movie";
pub(crate) const TV_NAMESPACE: &str = "tv";
pub(crate) const RAW_NAMESPACE: &str = "raw";

/// Opaque identifier for "the same content" across runs and across
/// superficially different titles.
///
/// Keys are namespaced strings:
/// - `movie:<slug>` for movies and documentaries,
/// - `tv:<slug>:sSSeEE` for episodes with a season/episode marker,
/// - `raw:<blake3>` for everything that could not be canonicalised.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("{_0}")]
pub struct IdentityKey(String);
impl IdentityKey {
    pub(crate) fn from_parts(namespace: &str, value: impl AsRef<str>) -> Self {
        Self(format!("{namespace}:{}", value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `false` for hash-of-raw-title keys, which don't merge textual variants
    /// of the same content.
    pub fn is_canonical(&self) -> bool {
        self.0.split_once(':').is_some_and(|(namespace, _)| namespace != RAW_NAMESPACE)
    }
}
impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl FromStr for IdentityKey {
    type Err = Error;

    /// Accepts a previously persisted key, checking only its namespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((MOVIE_NAMESPACE | TV_NAMESPACE | RAW_NAMESPACE, rest)) if !rest.is_empty() => Ok(Self(s.to_string())),
            _ => exn::bail!(ErrorKind::InvalidKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_persisted_keys() {
        assert!("movie:the-matrix".parse::<IdentityKey>().is_ok());
        assert!("tv:show-name:s01e02".parse::<IdentityKey>().is_ok());
        assert!("raw:abc123".parse::<IdentityKey>().is_ok());
    }

    #[test]
    fn test_rejects_malformed_keys() {
        for input in ["", "movie:", "the-matrix", "album:x"] {
            let err = input.parse::<IdentityKey>().unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidKey(_)), "accepted {input:?}");
        }
    }

    #[test]
    fn test_raw_keys_are_not_canonical() {
        assert!(IdentityKey::from_parts(MOVIE_NAMESPACE, "x").is_canonical());
        assert!(!IdentityKey::from_parts(RAW_NAMESPACE, "x").is_canonical());
    }
}
