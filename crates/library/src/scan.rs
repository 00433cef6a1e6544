//! Existing-media scan.
//!
//! Walks the local media directories and indexes every video file by the
//! identity key a playlist entry for the same content would get, so those
//! entries can be skipped instead of duplicated as pointer files.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use strm_cache::ExistingMediaIndex;
use strm_playlist::{Category, IdentityKey, movie_key, raw_key, split_episode, tv_key};
use strm_progress::{Outcome, Phase, ProgressTracker};
use strm_storage::BackendHandle;
use strm_storage::backend::{ExtensionFilterBackend, LocalBackend};
use tracing::instrument;

pub const VIDEO_EXTENSIONS: [&str; 10] = ["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm", "mpg", "mpeg"];

/// Read-only backend over a local media directory, listing video files only.
pub fn media_backend(dir: &Path) -> Result<BackendHandle> {
    let local = LocalBackend::existing(dir.display().to_string(), dir).or_raise(|| ErrorKind::Storage)?;
    Ok(Arc::new(ExtensionFilterBackend::new(Arc::new(local), VIDEO_EXTENSIONS)))
}

/// Infers the category of a local media file from its path, and the key it
/// is indexed under.
///
/// Anything under a directory mentioning "documentar" is a documentary, a
/// file name with an episode marker is an episode, everything else is a
/// movie.
pub fn identify(path: &Path) -> Option<(IdentityKey, Category)> {
    let stem = path.file_stem()?.to_str()?;
    let documentary = path
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|c| c.as_os_str().to_string_lossy().to_lowercase().contains("documentar"));
    if documentary {
        return Some((movie_key(stem), Category::Documentary));
    }
    if let Some(marker) = split_episode(stem) {
        let key = tv_key(&marker.base, marker.season, marker.episode).unwrap_or_else(|| raw_key(stem));
        return Some((key, Category::TvShow));
    }
    Some((movie_key(stem), Category::Movie))
}

/// Indexes every file the given backends list.
///
/// Listing errors are logged and counted against
/// [`Phase::ScanningLocalMedia`]; the scan carries on with the next file.
/// Stops early (with a partial index) once shutdown is requested.
#[instrument(skip_all, fields(backends = backends.len()))]
pub async fn scan_existing(backends: &[BackendHandle], tracker: &ProgressTracker) -> ExistingMediaIndex {
    let mut index = ExistingMediaIndex::new();
    let mut processed = 0u64;
    'backends: for backend in backends {
        tracing::debug!(backend = backend.name(), "Scanning existing media");
        let mut files = backend.list_stream(None);
        while let Some(item) = files.next().await {
            if tracker.is_shutdown_requested() {
                break 'backends;
            }
            processed += 1;
            match item {
                Ok(info) => {
                    let label = info.path.to_string_lossy();
                    match identify(&info.path) {
                        Some((key, category)) => {
                            tracing::trace!(path = %label, %key, %category, "Indexed existing media");
                            index.insert(key, category);
                            tracker.update_phase(Phase::ScanningLocalMedia, processed, &label, Outcome::Success);
                        },
                        None => {
                            tracing::debug!(path = %label, "Skipping file without a usable name");
                            tracker.update_phase(Phase::ScanningLocalMedia, processed, &label, Outcome::Skipped);
                        },
                    }
                },
                Err(err) => {
                    tracing::warn!(backend = backend.name(), error = %err, "Could not list media file");
                    tracker.add_error(format!("Scanning {} failed: {err}", backend.name()));
                    tracker.update_phase(Phase::ScanningLocalMedia, processed, "", Outcome::Failure);
                },
            }
        }
    }
    tracing::info!(files = processed, indexed = index.len(), "Scanned existing media");
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strm_playlist::{PlaylistEntry, canonical_key};
    use strm_progress::Verbosity;
    use strm_storage::backend::MockBackend;

    #[rstest]
    #[case("Movies/Heat (1995)/Heat (1995).mkv", Category::Movie)]
    #[case("TV/Show Name/Season 1/Show.Name.S01E02.720p.mkv", Category::TvShow)]
    #[case("Documentaries/Planet Earth (2006).mp4", Category::Documentary)]
    #[case("My Documentary Collection/Show S01E01.mkv", Category::Documentary)]
    fn test_identify_category(#[case] path: &str, #[case] expected: Category) {
        let (_, category) = identify(Path::new(path)).unwrap();
        assert_eq!(category, expected);
    }

    #[test]
    fn test_keys_match_playlist_entries() {
        let (key, _) = identify(Path::new("Movies/Heat (1995)/Heat.1995.1080p.mkv")).unwrap();
        assert_eq!(key, canonical_key(&PlaylistEntry::new("Heat (1995)", "http://x/1", Category::Movie)));

        let (key, _) = identify(Path::new("TV/Show.Name.S01E02.720p.mkv")).unwrap();
        assert_eq!(key, canonical_key(&PlaylistEntry::new("Show Name S01E02", "http://x/2", Category::TvShow)));
    }

    #[tokio::test]
    async fn test_scan_indexes_every_backend() {
        let movies: BackendHandle = Arc::new(MockBackend::with_files([
            ("Heat (1995)/Heat (1995).mkv", "x"),
            ("Up (2009).mp4", "x"),
        ]));
        let shows: BackendHandle = Arc::new(MockBackend::with_files([("Show/Show.S01E01.mkv", "x")]));
        let tracker = ProgressTracker::new(Verbosity::Quiet);
        tracker.start_phase(Phase::ScanningLocalMedia, 0);

        let index = scan_existing(&[movies, shows], &tracker).await;
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&movie_key("Heat")), Some(&Category::Movie));
        assert_eq!(index.get(&tv_key("Show", 1, 1).unwrap()), Some(&Category::TvShow));
        assert_eq!(tracker.phase(Phase::ScanningLocalMedia).unwrap().processed, 3);
    }

    #[tokio::test]
    async fn test_media_backend_lists_videos_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Heat")).unwrap();
        std::fs::write(dir.path().join("Heat/Heat.mkv"), b"").unwrap();
        std::fs::write(dir.path().join("Heat/Heat.srt"), b"").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"").unwrap();

        let backend = media_backend(dir.path()).unwrap();
        let tracker = ProgressTracker::new(Verbosity::Quiet);
        let index = scan_existing(&[backend], &tracker).await;
        assert_eq!(index.into_keys().collect::<Vec<_>>(), vec![movie_key("Heat")]);

        let err = media_backend(&dir.path().join("missing")).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Storage));
    }
}
