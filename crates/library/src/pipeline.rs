//! Pipeline orchestration.
//!
//! One run, start to finish:
//!
//! 1. load the cache snapshot (fatal if the store is unusable),
//! 2. **Scanning Local Media**: rebuild the existing-media index,
//! 3. **Parsing Playlist**: read entries, back-fill years, deduplicate,
//! 4. **Market Filtering**: reuse cached verdicts, classify the rest,
//! 5. **Creating Pointers**: reconcile and write in batches, then replace the
//!    pointer cache wholesale,
//! 6. **Cleanup**: remove pointer files the new cache no longer references.
//!
//! Shutdown is checked at every phase boundary and inside the long loops. A
//! cancelled run returns its report without replacing the pointer cache.

use crate::Context;
use crate::classify::{self, MarketClassifier, Verdict};
use crate::cleanup;
use crate::error::{ErrorKind, Result};
use crate::reconcile::{Candidate, Decision, decide};
use crate::report::{render_excluded_report, write_excluded_report};
use crate::scan::scan_existing;
use crate::write::{PointerWrite, write_batch};
use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::path::PathBuf;
use strm_cache::{CacheRecord, ExistingMediaIndex, PointerCache, Repository};
use strm_playlist::{IdentityKey, Keyed, PlaylistEntry, dedup};
use strm_progress::{Counters, Phase, ProgressTracker, RunReport, Tally};
use strm_storage::BackendHandle;
use tracing::instrument;

/// Runs the whole pipeline.
///
/// `entries` is consumed during the parsing phase, so a lazy parser only
/// does its work there. Only cache store failures are returned as errors;
/// everything else is recorded with the tracker and shows up in the report.
#[instrument(skip_all, fields(force_regenerate = ctx.force_regenerate, dry_run = ctx.dry_run))]
pub async fn run(
    ctx: &Context,
    repo: &Repository,
    media: &[BackendHandle],
    entries: impl IntoIterator<Item = PlaylistEntry>,
    classifier: &dyn MarketClassifier,
    tracker: &ProgressTracker,
) -> Result<RunReport> {
    let snapshot = repo.load().await.or_raise(|| ErrorKind::Store)?;
    let prior = snapshot.pointers;

    // =========================================================================
    // Scanning Local Media
    // =========================================================================

    tracker.start_phase(Phase::ScanningLocalMedia, 0);
    if stop(tracker, Phase::ScanningLocalMedia) {
        return Ok(tracker.report());
    }
    let existing = scan_existing(media, tracker).await;
    // A partial scan must not replace the previous index.
    if stop(tracker, Phase::ScanningLocalMedia) {
        return Ok(tracker.report());
    }
    repo.replace_existing_media(&existing).await.or_raise(|| ErrorKind::Store)?;
    tracker.complete_phase(Phase::ScanningLocalMedia);

    // =========================================================================
    // Parsing Playlist
    // =========================================================================

    tracker.start_phase(Phase::ParsingPlaylist, 0);
    if stop(tracker, Phase::ParsingPlaylist) {
        return Ok(tracker.report());
    }
    let mut parsed = 0u64;
    let unique = dedup(entries.into_iter().map(|mut entry| {
        parsed += 1;
        if let Some(year) = entry.backfill_year() {
            tracing::trace!(raw_title = %entry.raw_title, year, "Back-filled year");
        }
        entry
    }));
    let mut found = Counters::default();
    for keyed in &unique {
        found += Counters::found(keyed.entry.category);
    }
    tracker.update_stats(found);
    tracker.set_total(Phase::ParsingPlaylist, parsed);
    let unique_count = unique.len() as u64;
    tracker.batch_update_phase(
        Phase::ParsingPlaylist,
        parsed,
        &format!("Parsed {unique_count} unique entries"),
        Tally { success: unique_count, skipped: parsed - unique_count, ..Tally::default() },
    );
    tracker.complete_phase(Phase::ParsingPlaylist);

    // =========================================================================
    // Market Filtering
    // =========================================================================

    let sorted = Sorted::new(unique, &existing, &prior);
    tracker.start_phase(Phase::MarketFiltering, sorted.to_check.len() as u64);
    if stop(tracker, Phase::MarketFiltering) {
        return Ok(tracker.report());
    }
    let partition = classify::partition(classifier, sorted.to_check, ctx.max_workers, tracker).await;
    if stop(tracker, Phase::MarketFiltering) {
        return Ok(tracker.report());
    }
    let mut allowed = partition.allowed;
    allowed.extend(sorted.reused_allowed);
    let mut excluded = partition.excluded;
    excluded.extend(sorted.reused_excluded);

    let mut verdicts = Counters::default();
    for keyed in &allowed {
        verdicts += Counters::allowed(keyed.entry.category);
    }
    for keyed in &excluded {
        verdicts += Counters::excluded(keyed.entry.category);
    }
    tracker.update_stats(verdicts);
    tracker.complete_phase(Phase::MarketFiltering);
    tracing::info!(
        allowed = allowed.len(),
        excluded = excluded.len(),
        unclassified = partition.failed.len(),
        "Filtered playlist entries"
    );

    if let Some(path) = &ctx.excluded_report {
        let contents = render_excluded_report(excluded.iter().map(|k| &k.entry), allowed.len());
        if let Err(err) = write_excluded_report(path, &contents, ctx.dry_run).await {
            tracing::warn!(path = %path.display(), error = ?err, "Could not write excluded entries report");
            tracker.add_error(format!("Excluded entries report: {err}"));
        }
    }

    // =========================================================================
    // Creating Pointers
    // =========================================================================

    tracker.start_phase(Phase::CreatingPointers, (allowed.len() + sorted.unlaid.len()) as u64);
    if stop(tracker, Phase::CreatingPointers) {
        return Ok(tracker.report());
    }
    let mut pointers = PointerCache::with_capacity(allowed.len() + excluded.len());
    // Unclassified entries keep whatever they had, so the next run retries.
    for keyed in &partition.failed {
        carry_forward(&mut pointers, &prior, &keyed.key);
    }
    for Keyed { key, entry } in excluded {
        let candidate = Candidate {
            url: &entry.url,
            existing: existing.contains_key(&key),
            verdict: Verdict::Excluded,
            prior: prior.get(&key),
            target: None,
        };
        let record = match decide(&candidate, ctx.force_regenerate) {
            Decision::SkipExisting => CacheRecord::existing(entry.url),
            _ => CacheRecord::excluded(entry.url),
        };
        pointers.insert(key, record);
    }

    let mut processed = 0u64;
    let mut skipped = Tally::default();
    for keyed in &sorted.unlaid {
        processed += 1;
        skipped.skipped += 1;
        let entry = &keyed.entry;
        tracing::debug!(raw_title = %entry.raw_title, category = %entry.category, "No pointer layout, skipping");
    }

    let mut writes: Vec<PointerWrite> = Vec::new();
    let mut claimed: HashMap<PathBuf, IdentityKey> = HashMap::new();
    for Keyed { key, entry } in allowed {
        processed += 1;
        let target = resolve_target(ctx, &entry);
        let candidate = Candidate {
            url: &entry.url,
            existing: existing.contains_key(&key),
            verdict: Verdict::Allowed,
            prior: prior.get(&key),
            target: target.as_ref().ok().map(|(_, location)| location.as_path()),
        };
        match decide(&candidate, ctx.force_regenerate) {
            Decision::SkipExisting => {
                tracing::debug!(raw_title = %entry.raw_title, "Skipping, already in local media");
                pointers.insert(key, CacheRecord::existing(entry.url));
                skipped.skipped += 1;
            },
            Decision::SkipUnchanged => {
                tracing::debug!(raw_title = %entry.raw_title, "Skipping, pointer file unchanged");
                if let Ok((_, location)) = target {
                    claim(&mut claimed, location, &key);
                }
                carry_forward(&mut pointers, &prior, &key);
                skipped.skipped += 1;
            },
            Decision::Exclude => {
                pointers.insert(key, CacheRecord::excluded(entry.url));
            },
            Decision::Write => match target {
                Ok((path, location)) => {
                    claim(&mut claimed, location.clone(), &key);
                    writes.push(PointerWrite { key, category: entry.category, url: entry.url, path, location });
                },
                Err(err) => {
                    tracing::warn!(raw_title = %entry.raw_title, error = ?err, "Could not resolve pointer path");
                    tracker.add_error(format!("No pointer path for {}: {err}", entry.raw_title));
                    tracker.update_stats(Counters { strm_failed: 1, ..Counters::default() });
                    skipped.failure += 1;
                    carry_forward(&mut pointers, &prior, &key);
                },
            },
        }
    }
    tracker.update_stats(Counters { strm_skipped: skipped.skipped, ..Counters::default() });
    let mut done = processed - writes.len() as u64;
    tracker.batch_update_phase(Phase::CreatingPointers, done, "Reconciled entries", skipped);

    let batch_size = ctx.batch_size.max(1);
    let batches = writes.len().div_ceil(batch_size);
    let mut pending = writes.into_iter();
    for batch_no in 1..=batches {
        if stop(tracker, Phase::CreatingPointers) {
            return Ok(tracker.report());
        }
        let batch: Vec<PointerWrite> = pending.by_ref().take(batch_size).collect();
        done += batch.len() as u64;
        let report = write_batch(&ctx.output, batch).await;
        let mut tally = Tally::default();
        for op in report.written {
            tracing::info!(path = %op.location.display(), "Pointer file written");
            pointers.insert(op.key, CacheRecord::written(op.url, op.location));
            tally.success += 1;
        }
        for (op, err) in report.failed {
            tracing::warn!(path = %op.location.display(), error = ?err, "Could not write pointer file");
            tracker.add_error(format!("Writing {} failed: {err}", op.location.display()));
            carry_forward(&mut pointers, &prior, &op.key);
            tally.failure += 1;
        }
        tracker.batch_update_phase(Phase::CreatingPointers, done, &format!("Batch {batch_no}/{batches}"), tally);
        tracker.update_stats(Counters { strm_created: tally.success, strm_failed: tally.failure, ..Counters::default() });
    }
    tracker.complete_phase(Phase::CreatingPointers);

    repo.replace_pointer_cache(&pointers).await.or_raise(|| ErrorKind::Store)?;

    // =========================================================================
    // Cleanup
    // =========================================================================

    tracker.start_phase(Phase::Cleanup, 0);
    if stop(tracker, Phase::Cleanup) {
        return Ok(tracker.report());
    }
    let cleanup = cleanup::remove_orphans(&ctx.output, &pointers, tracker).await;
    tracker.update_stats(Counters {
        strm_orphaned: cleanup.removed,
        cleanup_failed: cleanup.failed,
        ..Counters::default()
    });
    tracker.complete_phase(Phase::Cleanup);

    let report = tracker.report();
    tracing::info!(
        created = report.counters.strm_created,
        skipped = report.counters.strm_skipped,
        orphaned = report.counters.strm_orphaned,
        failed = report.counters.strm_failed,
        "Run complete"
    );
    Ok(report)
}

/// Entries sorted by whether they still need the classifier.
struct Sorted {
    to_check: Vec<Keyed>,
    /// Existing media, or allowed by a previous run.
    reused_allowed: Vec<Keyed>,
    /// Excluded by a previous run.
    reused_excluded: Vec<Keyed>,
    /// Categories that never get pointer files.
    unlaid: Vec<Keyed>,
}
impl Sorted {
    fn new(unique: Vec<Keyed>, existing: &ExistingMediaIndex, prior: &PointerCache) -> Self {
        let mut sorted = Self {
            to_check: Vec::new(),
            reused_allowed: Vec::new(),
            reused_excluded: Vec::new(),
            unlaid: Vec::new(),
        };
        for keyed in unique {
            if !keyed.entry.category.has_pointer_layout() {
                sorted.unlaid.push(keyed);
            } else if existing.contains_key(&keyed.key) {
                sorted.reused_allowed.push(keyed);
            } else {
                match prior.get(&keyed.key).map(CacheRecord::is_allowed) {
                    Some(true) => sorted.reused_allowed.push(keyed),
                    Some(false) => sorted.reused_excluded.push(keyed),
                    None => sorted.to_check.push(keyed),
                }
            }
        }
        tracing::debug!(
            to_check = sorted.to_check.len(),
            reused_allowed = sorted.reused_allowed.len(),
            reused_excluded = sorted.reused_excluded.len(),
            unlaid = sorted.unlaid.len(),
            "Sorted entries against cache"
        );
        sorted
    }
}

/// Relative path and absolute location of an entry's pointer file.
fn resolve_target(ctx: &Context, entry: &PlaylistEntry) -> Result<(PathBuf, PathBuf)> {
    let path = ctx.layout.pointer_path(entry)?.ok_or_raise(|| ErrorKind::Template)?;
    let location = ctx.output.locate(&path).or_raise(|| ErrorKind::Storage)?;
    Ok((path, location))
}

fn carry_forward(pointers: &mut PointerCache, prior: &PointerCache, key: &IdentityKey) {
    if let Some(record) = prior.get(key) {
        pointers.insert(key.clone(), record.clone());
    }
}

/// Two different keys landing on the same file isn't resolved here. Both are
/// recorded, and since writes run in playlist order the later entry's URL is
/// what ends up on disk.
fn claim(claimed: &mut HashMap<PathBuf, IdentityKey>, location: PathBuf, key: &IdentityKey) {
    if let Some(other) = claimed.insert(location.clone(), key.clone()) {
        tracing::warn!(path = %location.display(), %key, %other, "Pointer path collision between identity keys");
    }
}

fn stop(tracker: &ProgressTracker, phase: Phase) -> bool {
    let stop = tracker.is_shutdown_requested();
    if stop {
        tracing::info!(%phase, "Shutdown requested, stopping");
    }
    stop
}
