//! Excluded entries report.
//!
//! A plain-text overview of what the classifier kept out of the library:
//! movies one per line, episodes grouped by series with a count.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use strm_playlist::{Category, PlaylistEntry, split_episode};
use tracing::instrument;

/// Excluded entries, grouped the way the report lists them.
struct ExcludedReport<'a> {
    allowed: usize,
    total: usize,
    movies: Vec<&'a str>,
    shows: BTreeMap<String, usize>,
}
impl fmt::Display for ExcludedReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Excluded Entries Report ===\n")?;
        writeln!(f, "Total allowed: {}", self.allowed)?;
        writeln!(f, "Total excluded: {}\n", self.total)?;
        writeln!(f, "--- Movies ---")?;
        for movie in &self.movies {
            writeln!(f, "{movie}")?;
        }
        writeln!(f, "\nTotal movies excluded: {}\n", self.movies.len())?;
        writeln!(f, "--- TV Shows ---")?;
        for (base, episodes) in &self.shows {
            writeln!(f, "{base} - {episodes} episodes excluded")?;
        }
        writeln!(f, "\nTotal shows excluded: {}", self.shows.len())?;
        writeln!(f, "=== End of Report ===")
    }
}

/// Renders the report for the given excluded entries.
pub fn render_excluded_report<'a>(excluded: impl IntoIterator<Item = &'a PlaylistEntry>, allowed: usize) -> String {
    let mut report = ExcludedReport { allowed, total: 0, movies: Vec::new(), shows: BTreeMap::new() };
    for entry in excluded {
        report.total += 1;
        match entry.category {
            Category::Movie => report.movies.push(&entry.raw_title),
            Category::TvShow => {
                let base = match split_episode(&entry.raw_title) {
                    Some(marker) => marker.base,
                    None => entry.raw_title.trim().to_string(),
                };
                *report.shows.entry(base).or_default() += 1;
            },
            _ => {},
        }
    }
    report.movies.sort_unstable();
    report.to_string()
}

/// Writes the report to `path`, creating parent directories. A dry run only
/// logs what it would have written.
#[instrument(skip(contents), fields(path = %path.display()))]
pub async fn write_excluded_report(path: &Path, contents: &str, dry_run: bool) -> Result<()> {
    if dry_run {
        tracing::info!(bytes = contents.len(), "Dry run: skipping excluded entries report");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Report)?;
    }
    tokio::fs::write(path, contents).await.or_raise(|| ErrorKind::Report)?;
    tracing::info!("Excluded entries report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, category: Category) -> PlaylistEntry {
        PlaylistEntry::new(title, "http://x/1", category)
    }

    #[test]
    fn test_report_layout() {
        let excluded = [
            entry("Zodiac (2007)", Category::Movie),
            entry("Alien (1979)", Category::Movie),
            entry("Show Name S01E01", Category::TvShow),
            entry("Show Name S01E02 1080p", Category::TvShow),
            entry("Other S02E01", Category::TvShow),
            entry("Planet Earth", Category::Documentary),
        ];
        let report = render_excluded_report(&excluded, 12);
        assert_eq!(
            report,
            "=== Excluded Entries Report ===\n\n\
             Total allowed: 12\n\
             Total excluded: 6\n\n\
             --- Movies ---\n\
             Alien (1979)\n\
             Zodiac (2007)\n\
             \nTotal movies excluded: 2\n\n\
             --- TV Shows ---\n\
             Other - 1 episodes excluded\n\
             Show Name - 2 episodes excluded\n\
             \nTotal shows excluded: 2\n\
             === End of Report ===\n"
        );
    }

    #[test]
    fn test_empty_report_still_has_every_section() {
        let report = render_excluded_report([], 3);
        assert!(report.starts_with("=== Excluded Entries Report ===\n\nTotal allowed: 3\nTotal excluded: 0\n"));
        assert!(report.contains("--- Movies ---\n\nTotal movies excluded: 0\n"));
        assert!(report.ends_with("--- TV Shows ---\n\nTotal shows excluded: 0\n=== End of Report ===\n"));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_respects_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/excluded.txt");

        write_excluded_report(&path, "report\n", true).await.unwrap();
        assert!(!path.exists());

        write_excluded_report(&path, "report\n", false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "report\n");
    }
}
