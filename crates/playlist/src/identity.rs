//! Identity keys and deduplication.
//!
//! Every playlist entry is reduced to an [`IdentityKey`] that is a pure
//! function of its title, category and (for episodes) season/episode, so the
//! same content maps to the same key across playlist refreshes.
//!
//! Episodes without a recognisable `SxxEyy` marker fall back to a hash of the
//! raw title. That fallback does not canonicalise the title: two textual
//! variants of the same episode get two different keys.

use crate::consts::EPISODE_MARKER_REGEX;
use crate::models::key::{MOVIE_NAMESPACE, RAW_NAMESPACE, TV_NAMESPACE};
use crate::models::{Category, IdentityKey, PlaylistEntry};
use crate::text::canonical_slug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::instrument;

/// Season/episode marker found in a raw title, plus the series name before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMarker {
    /// Everything before the marker, trimmed.
    pub base: String,
    pub season: u32,
    pub episode: u32,
}

/// A deduplicated entry along with the key it was deduplicated by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed {
    pub key: IdentityKey,
    pub entry: PlaylistEntry,
}

/// Finds the first `SxxEyy` marker (case-insensitive, optional whitespace
/// between the two halves).
pub fn split_episode(raw_title: &str) -> Option<EpisodeMarker> {
    let captures = EPISODE_MARKER_REGEX.captures(raw_title)?;
    let whole = captures.get(0)?;
    Some(EpisodeMarker {
        base: raw_title[..whole.start()].trim().to_string(),
        season: captures.get(1)?.as_str().parse().ok()?,
        episode: captures.get(2)?.as_str().parse().ok()?,
    })
}

/// Key for a movie or documentary. Falls back to [`raw_key`] when nothing
/// recognisable is left after normalisation.
pub fn movie_key(raw_title: &str) -> IdentityKey {
    match canonical_slug(raw_title) {
        slug if slug.is_empty() => raw_key(raw_title),
        slug => IdentityKey::from_parts(MOVIE_NAMESPACE, slug),
    }
}

/// Key for an episode of the series named `base`. `None` when the series name
/// normalises to nothing.
pub fn tv_key(base: &str, season: u32, episode: u32) -> Option<IdentityKey> {
    let slug = canonical_slug(base);
    if slug.is_empty() {
        return None;
    }
    Some(IdentityKey::from_parts(TV_NAMESPACE, format!("{slug}:s{season:02}e{episode:02}")))
}

/// Hash of the title exactly as given.
pub fn raw_key(raw_title: &str) -> IdentityKey {
    IdentityKey::from_parts(RAW_NAMESPACE, blake3::hash(raw_title.as_bytes()).to_hex())
}

/// Computes the identity key of a playlist entry.
#[instrument(level = "trace", skip_all, fields(raw_title = %entry.raw_title, category = %entry.category))]
pub fn canonical_key(entry: &PlaylistEntry) -> IdentityKey {
    match entry.category {
        Category::Movie | Category::Documentary => movie_key(&entry.raw_title),
        Category::TvShow => split_episode(&entry.raw_title)
            .and_then(|marker| tv_key(&marker.base, marker.season, marker.episode))
            .unwrap_or_else(|| raw_key(&entry.raw_title)),
        Category::Replay | Category::Unknown => raw_key(&entry.raw_title),
    }
}

/// Collapses entries sharing an identity key, in one pass.
///
/// The last occurrence of a key wins (a later source supersedes an earlier
/// duplicate), while the output keeps the position of the key's first
/// occurrence so the result is deterministic.
pub fn dedup(entries: impl IntoIterator<Item = PlaylistEntry>) -> Vec<Keyed> {
    let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
    let mut unique: Vec<Keyed> = Vec::new();
    let mut seen = 0usize;
    for entry in entries {
        seen += 1;
        let key = canonical_key(&entry);
        match positions.entry(key) {
            Entry::Occupied(slot) => unique[*slot.get()].entry = entry,
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(unique.len());
                unique.push(Keyed { key, entry });
            },
        }
    }
    tracing::debug!(parsed = seen, unique = unique.len(), "Deduplicated playlist entries");
    unique
}
