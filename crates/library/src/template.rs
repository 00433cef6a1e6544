//! Path templating for pointer files.
//!
//! Converts a [`PlaylistEntry`] into a deterministic path below the output
//! root using user-configured [upon] templates. The template syntax follows
//! upon's Mustache-like conventions (`{{ variable }}`, `{{ value|formatter }}`,
//! `{% if value %}…{% endif %}`), extended with:
//!
//! - **`safe`**: Makes a string usable as a single path segment by replacing
//!   separators and characters reserved on common filesystems, collapsing
//!   whitespace and trimming trailing dots.
//! - **`slug`**: Converts strings to URL-safe slugs, stripping quotation marks
//!   first to avoid artifacts like leading/trailing hyphens.
//! - **`truncate`**: Truncates strings to a maximum byte length at a character
//!   boundary, usable as either `truncate(value, n)` or `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable    | Type             | Description                                       |
//! |-------------|------------------|---------------------------------------------------|
//! | `title`     | `String`         | Cleaned title (series name for episodes)          |
//! | `raw_title` | `String`         | Title exactly as it appeared in the playlist      |
//! | `year`      | `Option<u64>`    | Release year                                      |
//! | `season`    | `String`         | Two-digit season, `01` when unknown               |
//! | `episode`   | `String`         | Two-digit episode, `01` when unknown              |
//! | `category`  | `String`         | `MOVIE`, `TVSHOW` or `DOCUMENTARY`                |
//! | `group`     | `Option<String>` | Playlist group                                    |
//!
//! # Example
//!
//! ```
//! use strm_library::PathGenerator;
//! use strm_playlist::{Category, PlaylistEntry};
//!
//! let entry = PlaylistEntry::new("Heat", "http://example.com/heat", Category::Movie).with_year(1995);
//! let generator: PathGenerator = "Movies/{{ title|safe }}{% if year %} ({{ year }}){% endif %}".parse().unwrap();
//! assert_eq!(generator.generate(&entry).unwrap(), "Movies/Heat (1995)");
//! ```

use crate::POINTER_EXTENSION;
use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::path::PathBuf;
use std::str::FromStr;
use strm_playlist::{Category, PlaylistEntry};
use strm_storage::validate_path;
use tracing::instrument;
use upon::{Engine, Template};

/// Generates deterministic filesystem paths from a [`PlaylistEntry`] and a
/// user-defined template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at render time. The
/// compiled template is reusable across many [`generate`](Self::generate) calls.
///
/// Generated paths are normalized (trimmed, deduplicated separators) and
/// validated by [`strm_storage::validate_path`] to prevent directory traversal.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PathGenerator {
    type Err = Error;

    /// Compiles the given template string into a reusable [`PathGenerator`].
    ///
    /// Returns [`ErrorKind::Template`] if the template syntax is invalid.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        // Compile the template early so we can fail-fast in construction.
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl PathGenerator {
    /// Renders the template against the given entry, returning the normalized
    /// path without any file extension.
    #[instrument(level = "trace", skip_all, fields(raw_title = %entry.raw_title))]
    pub fn generate(&self, entry: &PlaylistEntry) -> Result<String> {
        let path = self
            .template
            .render(&self.engine, Self::parameters(entry))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Self::normalize(path)
    }

    /// Renders the template and appends a file extension.
    ///
    /// The extension is trimmed of leading/trailing dots, so both `"strm"` and
    /// `".strm"` produce the same result.
    pub fn generate_with_ext(&self, entry: &PlaylistEntry, ext: impl AsRef<str>) -> Result<PathBuf> {
        let path = self.generate(entry)?;
        Ok(PathBuf::from(format!("{path}.{}", ext.as_ref().trim().trim_matches('.'))))
    }

    /// Trims each path segment, joins them with `/`, then validates via
    /// [`strm_storage::validate_path`].
    fn normalize(s: impl Into<String>) -> Result<String> {
        let path = s.into().trim().split('/').map(str::trim).collect::<Vec<_>>().join("/");
        validate_path(&path).or_raise(|| ErrorKind::Template).and_then(|p| {
            p.to_str().map(|p| p.to_string())
            // Infallible: input was String, so won't fail. Here for completeness.
            .ok_or_raise(|| ErrorKind::Template)
        })
    }

    /// Builds the [`upon::Value`] map exposed to the template engine.
    ///
    /// Episodes without a season/episode marker are laid out as S01E01 under
    /// their full title.
    fn parameters(entry: &PlaylistEntry) -> upon::Value {
        let (season, episode) = entry.episode_marker().unwrap_or((1, 1));
        upon::value! {
            title: &entry.title,
            raw_title: &entry.raw_title,
            year: entry.year.map(u64::from),
            season: format!("{season:02}"),
            episode: format!("{episode:02}"),
            category: entry.category.as_str(),
            group: entry.group.as_deref(),
        }
    }
}

/// One compiled template per category that gets pointer files.
pub struct PointerLayout {
    movie: PathGenerator,
    tv: PathGenerator,
    documentary: PathGenerator,
}
impl PointerLayout {
    /// Compiles all three templates; any syntax error is an
    /// [`ErrorKind::Template`].
    pub fn new(movie: &str, tv: &str, documentary: &str) -> Result<Self> {
        Ok(Self {
            movie: movie.parse()?,
            tv: tv.parse()?,
            documentary: documentary.parse()?,
        })
    }

    pub fn generator(&self, category: Category) -> Option<&PathGenerator> {
        match category {
            Category::Movie => Some(&self.movie),
            Category::TvShow => Some(&self.tv),
            Category::Documentary => Some(&self.documentary),
            Category::Replay | Category::Unknown => None,
        }
    }

    /// Pointer-file path for `entry`, relative to the output root. `None` for
    /// categories that are never written.
    pub fn pointer_path(&self, entry: &PlaylistEntry) -> Result<Option<PathBuf>> {
        let Some(generator) = self.generator(entry.category) else {
            return Ok(None);
        };
        if entry.title.trim().is_empty() {
            exn::bail!(ErrorKind::Template);
        }
        generator.generate_with_ext(entry, POINTER_EXTENSION).map(Some)
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Characters that can't appear in a path segment on at least one common
    /// filesystem.
    const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    pub(crate) fn path_safe(s: &str) -> String {
        let replaced: String = s.chars().map(|c| if RESERVED.contains(&c) || c.is_control() { ' ' } else { c }).collect();
        let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
        // A segment of only dots would be read as `.` or `..`.
        collapsed.trim_end_matches(['.', ' ']).trim_start_matches(['.', ' ']).to_string()
    }

    fn safe_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", path_safe(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Custom formatter that converts strings to URL-safe slugs.
    ///
    /// Strips quotation marks before slugifying to avoid awkward slug output
    /// like `"hello"` becoming `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Truncates a string to a maximum byte length at a character boundary.
    fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    /// Registers the `safe` and `slug` formatters and the `truncate` function
    /// on the given engine.
    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("safe", safe_formatter);
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate_to_char_boundary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use crate::test_support::{MOVIE, layout};

    #[test]
    fn test_movie_with_and_without_year() {
        let layout = layout();
        let heat = PlaylistEntry::new("Heat", "http://x/1", Category::Movie).with_year(1995);
        assert_eq!(layout.pointer_path(&heat).unwrap().unwrap(), PathBuf::from("Movies/Heat (1995)/Heat (1995).strm"));
        let up = PlaylistEntry::new("Up", "http://x/2", Category::Movie);
        assert_eq!(layout.pointer_path(&up).unwrap().unwrap(), PathBuf::from("Movies/Up/Up.strm"));
    }

    #[test]
    fn test_episode_uses_series_name_and_padding() {
        let entry = PlaylistEntry::new("Show.Name.S1E2.1080p", "http://x/1", Category::TvShow);
        assert_eq!(
            layout().pointer_path(&entry).unwrap().unwrap(),
            PathBuf::from("TV Shows/Show Name/Season 01/Show Name S01E02.strm")
        );
    }

    #[test]
    fn test_episode_without_marker_is_s01e01() {
        let entry = PlaylistEntry::new("Some Special", "http://x/1", Category::TvShow);
        assert_eq!(
            layout().pointer_path(&entry).unwrap().unwrap(),
            PathBuf::from("TV Shows/Some Special/Season 01/Some Special S01E01.strm")
        );
    }

    #[test]
    fn test_documentary_layout() {
        let entry = PlaylistEntry::new("Planet Earth", "http://x/1", Category::Documentary).with_year(2006);
        assert_eq!(
            layout().pointer_path(&entry).unwrap().unwrap(),
            PathBuf::from("Documentaries/Planet Earth (2006)/Planet Earth (2006).strm")
        );
    }

    #[rstest]
    #[case(Category::Replay)]
    #[case(Category::Unknown)]
    fn test_categories_without_layout(#[case] category: Category) {
        let entry = PlaylistEntry::new("Match of the Day", "http://x/1", category);
        assert_eq!(layout().pointer_path(&entry).unwrap(), None);
    }

    #[test]
    fn test_invalid_template_fails_fast() {
        let err = "{{ title".parse::<PathGenerator>().err().unwrap();
        assert!(matches!(&*err, ErrorKind::Template));
        assert!(PointerLayout::new(MOVIE, "{% if %}", MOVIE).is_err());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let generator: PathGenerator = "../{{ title }}".parse().unwrap();
        let entry = PlaylistEntry::new("Heat", "http://x/1", Category::Movie);
        assert!(generator.generate(&entry).is_err());
    }

    #[test]
    fn test_unsafe_title_cannot_escape_segment() {
        let generator: PathGenerator = "Movies/{{ raw_title|safe }}".parse().unwrap();
        let entry = PlaylistEntry::new("AC/DC: Live? <1991>", "http://x/1", Category::Movie);
        assert_eq!(generator.generate(&entry).unwrap(), "Movies/AC DC Live 1991");
        let entry = PlaylistEntry::new("..", "http://x/1", Category::Movie);
        assert_eq!(generator.generate(&entry).unwrap(), "Movies");
    }

    #[rstest]
    #[case("  Heat  ", "Heat")]
    #[case("Heat...", "Heat")]
    #[case("a\tb\nc", "a b c")]
    #[case("Who? Me!", "Who Me!")]
    fn test_path_safe(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(addons::path_safe(input), expected);
    }

    #[test]
    fn test_slug_strips_quotes() {
        let generator: PathGenerator = "{{ raw_title|slug }}".parse().unwrap();
        let entry = PlaylistEntry::new("\"Hello\" World's 'Test'", "http://x/1", Category::Movie);
        assert_eq!(generator.generate(&entry).unwrap(), "hello-worlds-test");
    }

    #[test]
    fn test_truncate_filter_function() {
        let generator: PathGenerator = "{{ raw_title|truncate: 10|slug }}".parse().unwrap();
        let entry = PlaylistEntry::new("A Very Long Title Indeed", "http://x/1", Category::Movie);
        assert_eq!(generator.generate(&entry).unwrap(), "a-very-lon");
    }

    #[test]
    fn test_extension_is_trimmed() {
        let generator: PathGenerator = "{{ title }}".parse().unwrap();
        let entry = PlaylistEntry::new("Heat", "http://x/1", Category::Movie);
        assert_eq!(generator.generate_with_ext(&entry, ".strm").unwrap(), PathBuf::from("Heat.strm"));
    }
}
