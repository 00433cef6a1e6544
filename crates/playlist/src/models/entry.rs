use crate::identity::split_episode;
use crate::models::Category;
use crate::text::{display_title, extract_year};

/// A single stream parsed from a playlist.
///
/// Only [`year`](Self::year) may change after construction, and only through
/// [`backfill_year`](Self::backfill_year) when it was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Title exactly as it appeared in the playlist.
    pub raw_title: String,
    /// Cleaned title, safe to use as a path segment. For episodes this is the
    /// series name.
    pub title: String,
    pub category: Category,
    pub year: Option<u16>,
    /// Stream URL written into the pointer file.
    pub url: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Playlist group the entry was listed under, if any.
    pub group: Option<String>,
}
impl PlaylistEntry {
    pub fn new(raw_title: impl Into<String>, url: impl Into<String>, category: Category) -> Self {
        let raw_title = raw_title.into();
        let marker = match category {
            Category::TvShow => split_episode(&raw_title),
            _ => None,
        };
        let title = match &marker {
            Some(marker) if !marker.base.is_empty() => display_title(&marker.base),
            _ => display_title(&raw_title),
        };
        Self {
            title,
            category,
            year: None,
            url: url.into(),
            season: marker.as_ref().map(|m| m.season),
            episode: marker.as_ref().map(|m| m.episode),
            group: None,
            raw_title,
        }
    }

    pub fn with_year(mut self, year: impl Into<Option<u16>>) -> Self {
        self.year = year.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Season and episode, when both are known.
    pub fn episode_marker(&self) -> Option<(u32, u32)> {
        Some((self.season?, self.episode?))
    }

    /// Fills in a missing year from the raw title. Never overwrites a year
    /// that was supplied explicitly. Returns the year that was filled in.
    pub fn backfill_year(&mut self) -> Option<u16> {
        if self.year.is_some() {
            return None;
        }
        self.year = extract_year(&self.raw_title);
        self.year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_fields_come_from_marker() {
        let entry = PlaylistEntry::new("Show.Name.S01E02.1080p", "http://x/1", Category::TvShow);
        assert_eq!(entry.title, "Show Name");
        assert_eq!(entry.episode_marker(), Some((1, 2)));
    }

    #[test]
    fn test_markers_are_ignored_outside_tv() {
        let entry = PlaylistEntry::new("Movie S01E02", "http://x/1", Category::Movie);
        assert_eq!(entry.episode_marker(), None);
    }

    #[test]
    fn test_backfill_fills_missing_year() {
        let mut entry = PlaylistEntry::new("The Matrix (1999)", "http://x/1", Category::Movie);
        assert_eq!(entry.backfill_year(), Some(1999));
        assert_eq!(entry.year, Some(1999));
        assert_eq!(entry.title, "The Matrix");
    }

    #[test]
    fn test_backfill_never_overwrites_explicit_year() {
        let mut entry = PlaylistEntry::new("The Matrix (1999)", "http://x/1", Category::Movie).with_year(2003u16);
        assert_eq!(entry.backfill_year(), None);
        assert_eq!(entry.year, Some(2003));
    }
}
