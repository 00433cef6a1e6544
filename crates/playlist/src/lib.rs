//! Playlist entries and their identities.
//!
//! - [`models`]: [`PlaylistEntry`], [`Category`] and [`IdentityKey`].
//! - [`identity`]: the pure key derivation plus last-wins [`dedup`].
//! - [`parse`]: a small extended-M3U reader producing entries lazily.

mod consts;
pub mod error;
pub mod identity;
pub mod models;
mod parse;
mod text;

pub use crate::identity::{EpisodeMarker, Keyed, canonical_key, dedup, movie_key, raw_key, split_episode, tv_key};
pub use crate::models::{Category, IdentityKey, PlaylistEntry};
pub use crate::parse::{IgnoreKeywords, Keywords, parse};

/// Extracts a release year from a title, as used by
/// [`PlaylistEntry::backfill_year`].
pub fn extract_year(raw_title: impl AsRef<str>) -> Option<u16> {
    text::extract_year(raw_title.as_ref())
}

/// Cleans a title into something usable as a single path segment.
pub fn display_title(raw_title: impl AsRef<str>) -> String {
    text::display_title(raw_title.as_ref())
}
