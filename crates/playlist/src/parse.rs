//! Minimal extended-M3U reader.
//!
//! Understands `#EXTINF` directives (attributes plus display title),
//! `#EXTGRP` group lines and the stream URL that follows them. Everything else
//! is skipped. Entries are produced lazily in file order.

use crate::consts::EXTINF_ATTRIBUTE_REGEX;
use crate::identity::split_episode;
use crate::models::{Category, PlaylistEntry};
use std::collections::HashMap;

/// Group keywords used to categorise entries, plus per-category ignore lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Keywords {
    pub tv: Vec<String>,
    pub documentary: Vec<String>,
    pub movie: Vec<String>,
    pub replay: Vec<String>,
    pub ignore: IgnoreKeywords,
}

/// Title substrings that drop an entry entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IgnoreKeywords {
    /// Applied to TV entries.
    pub tvshows: Vec<String>,
    /// Applied to every other category.
    pub movies: Vec<String>,
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().filter(|n| !n.trim().is_empty()).any(|n| haystack.contains(&n.trim().to_lowercase()))
}

impl Keywords {
    fn has_category_keywords(&self) -> bool {
        [&self.tv, &self.documentary, &self.movie, &self.replay].iter().any(|list| !list.is_empty())
    }

    /// Categorises by group name. Without any configured keywords, falls back
    /// to "episode marker means TV, anything else is a movie".
    pub fn categorize(&self, group: Option<&str>, raw_title: &str) -> Category {
        if !self.has_category_keywords() {
            return match split_episode(raw_title) {
                Some(_) => Category::TvShow,
                None => Category::Movie,
            };
        }
        let Some(group) = group else {
            return Category::Unknown;
        };
        // Most specific first: "replays" or "docs" groups often also match a
        // generic TV or movie keyword.
        if contains_any(group, &self.replay) {
            Category::Replay
        } else if contains_any(group, &self.documentary) {
            Category::Documentary
        } else if contains_any(group, &self.tv) {
            Category::TvShow
        } else if contains_any(group, &self.movie) {
            Category::Movie
        } else {
            Category::Unknown
        }
    }

    pub fn is_ignored(&self, category: Category, raw_title: &str) -> bool {
        match category {
            Category::TvShow => contains_any(raw_title, &self.ignore.tvshows),
            _ => contains_any(raw_title, &self.ignore.movies),
        }
    }
}

#[derive(Debug, Default)]
struct Directive {
    attributes: HashMap<String, String>,
    title: String,
    group: Option<String>,
}
impl Directive {
    /// Parses everything after `#EXTINF:`, e.g.
    /// `-1 tvg-name="X" group-title="Movies",Display Title`.
    fn parse(rest: &str) -> Self {
        // The title starts after the first comma outside of quotes.
        let mut in_quotes = false;
        let split = rest.char_indices().find_map(|(i, c)| {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => return Some(i),
                _ => {},
            }
            None
        });
        let (head, title) = match split {
            Some(i) => (&rest[..i], rest[i + 1..].trim()),
            None => (rest, ""),
        };
        let attributes: HashMap<String, String> = EXTINF_ATTRIBUTE_REGEX
            .captures_iter(head)
            .filter_map(|c| Some((c.get(1)?.as_str().to_lowercase(), c.get(2)?.as_str().trim().to_string())))
            .collect();
        let group = attributes.get("group-title").filter(|g| !g.is_empty()).cloned();
        Self { attributes, title: title.to_string(), group }
    }

    fn into_entry(self, url: &str, keywords: &Keywords) -> Option<PlaylistEntry> {
        let title = match self.title.is_empty() {
            true => self.attributes.get("tvg-name").cloned().unwrap_or_default(),
            false => self.title,
        };
        if title.is_empty() {
            tracing::debug!(url, "Skipping playlist entry without a title");
            return None;
        }
        let category = keywords.categorize(self.group.as_deref(), &title);
        if keywords.is_ignored(category, &title) {
            tracing::debug!(title = %title, %category, "Ignored by keyword");
            return None;
        }
        let year = ["tvg-year", "year"].iter().find_map(|k| self.attributes.get(*k)?.parse::<u16>().ok());
        let mut entry = PlaylistEntry::new(title, url, category).with_year(year);
        if let Some(group) = self.group {
            entry = entry.with_group(group);
        }
        Some(entry)
    }
}

/// Lazily reads playlist entries from extended-M3U text.
pub fn parse<'a>(text: &'a str, keywords: &'a Keywords) -> impl Iterator<Item = PlaylistEntry> + 'a {
    let mut lines = text.lines().map(str::trim);
    let mut pending: Option<Directive> = None;
    std::iter::from_fn(move || {
        for line in lines.by_ref() {
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("#EXTINF:") {
                pending = Some(Directive::parse(rest));
                continue;
            }
            if let Some(group) = line.strip_prefix("#EXTGRP:") {
                if let Some(directive) = pending.as_mut() {
                    directive.group.get_or_insert_with(|| group.trim().to_string());
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let Some(directive) = pending.take() else {
                tracing::trace!(url = line, "Skipping URL without an #EXTINF directive");
                continue;
            };
            if let Some(entry) = directive.into_entry(line, keywords) {
                return Some(entry);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="" tvg-name="The Matrix" group-title="Movies 4K",The Matrix (1999)
http://example.com/movie/1.mkv
#EXTINF:-1 group-title="Series | Drama",Show.Name.S01E02.1080p
http://example.com/series/2.mkv

#EXTINF:-1 group-title="Docs",Planet Earth
http://example.com/doc/3.mkv
#EXTINF:-1 group-title="Sport Replays",UFC 300 Replay
http://example.com/replay/4.ts
#EXTINF:-1 group-title="Kids",Cartoon
http://example.com/other/5.ts
http://example.com/orphan-url.ts
"#;

    fn keywords() -> Keywords {
        Keywords {
            tv: vec!["series".into()],
            documentary: vec!["doc".into()],
            movie: vec!["movies".into()],
            replay: vec!["replays".into()],
            ignore: IgnoreKeywords::default(),
        }
    }

    #[test]
    fn test_parses_entries_in_file_order() {
        let keywords = keywords();
        let entries: Vec<_> = parse(PLAYLIST, &keywords).collect();
        let summary: Vec<_> = entries.iter().map(|e| (e.raw_title.as_str(), e.category)).collect();
        assert_eq!(
            summary,
            vec![
                ("The Matrix (1999)", Category::Movie),
                ("Show.Name.S01E02.1080p", Category::TvShow),
                ("Planet Earth", Category::Documentary),
                ("UFC 300 Replay", Category::Replay),
                ("Cartoon", Category::Unknown),
            ]
        );
        assert_eq!(entries[0].url, "http://example.com/movie/1.mkv");
        assert_eq!(entries[0].group.as_deref(), Some("Movies 4K"));
        assert_eq!(entries[1].episode_marker(), Some((1, 2)));
    }

    #[test]
    fn test_ignore_keywords_are_per_category() {
        let mut keywords = keywords();
        keywords.ignore.movies = vec!["matrix".into()];
        keywords.ignore.tvshows = vec!["planet".into()];
        let titles: Vec<_> = parse(PLAYLIST, &keywords).map(|e| e.raw_title).collect();
        assert!(!titles.contains(&"The Matrix (1999)".to_string()));
        // Documentaries use the movie list, so the TV list doesn't apply.
        assert!(titles.contains(&"Planet Earth".to_string()));
    }

    #[test]
    fn test_commas_inside_attributes_do_not_split_the_title() {
        let text = "#EXTINF:-1 group-title=\"Movies, New\" tvg-year=\"2010\",Inception, Extended\nhttp://x/1\n";
        let keywords = keywords();
        let entry = parse(text, &keywords).next().unwrap();
        assert_eq!(entry.raw_title, "Inception, Extended");
        assert_eq!(entry.group.as_deref(), Some("Movies, New"));
        assert_eq!(entry.year, Some(2010));
    }

    #[test]
    fn test_falls_back_to_tvg_name_and_extgrp() {
        let text = "#EXTINF:-1 tvg-name=\"Arrival\",\n#EXTGRP:Movies\nhttp://x/1\n";
        let keywords = keywords();
        let entry = parse(text, &keywords).next().unwrap();
        assert_eq!(entry.raw_title, "Arrival");
        assert_eq!(entry.category, Category::Movie);
    }

    #[test]
    fn test_without_keywords_markers_decide() {
        let keywords = Keywords::default();
        let categories: Vec<_> = parse(PLAYLIST, &keywords).map(|e| e.category).collect();
        assert_eq!(categories[0], Category::Movie);
        assert_eq!(categories[1], Category::TvShow);
    }
}
