//! Market classification.
//!
//! The classifier itself is an external collaborator behind
//! [`MarketClassifier`]; this module only runs it across a bounded pool and
//! sorts the results. [`AllowAll`] is the stand-in used when no classifier
//! backend is wired up.

use async_trait::async_trait;
use derive_more::{Display, Error};
use futures::{StreamExt, future, stream};
use strm_playlist::{Keyed, PlaylistEntry};
use strm_progress::{Outcome, Phase, ProgressTracker};
use tracing::instrument;

/// Whether an entry may be materialised in this market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Excluded,
}

/// The classifier could not reach a verdict for an entry.
///
/// Never retried by the engine: the entry is left unclassified for this run
/// and will be looked at again on the next one.
#[derive(Debug, Display, Error)]
#[display("market classifier failed: {_0}")]
pub struct ClassifierError(#[error(not(source))] pub String);

pub type ClassifierResult<T> = std::result::Result<T, exn::Exn<ClassifierError>>;

#[async_trait]
pub trait MarketClassifier: Send + Sync {
    async fn classify(&self, entry: &PlaylistEntry) -> ClassifierResult<Verdict>;
}

/// Allows every entry without looking anything up.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl MarketClassifier for AllowAll {
    async fn classify(&self, _entry: &PlaylistEntry) -> ClassifierResult<Verdict> {
        Ok(Verdict::Allowed)
    }
}

/// Entries split by verdict, each list in input order.
#[derive(Debug, Default)]
pub struct Partition {
    pub allowed: Vec<Keyed>,
    pub excluded: Vec<Keyed>,
    /// No verdict this run.
    pub failed: Vec<Keyed>,
    /// Never handed to the classifier because shutdown was requested.
    pub skipped: Vec<Keyed>,
}

/// Classifies `entries` with at most `max_workers` calls in flight.
///
/// Progress is reported against [`Phase::MarketFiltering`] as verdicts come
/// back. Once shutdown is requested no new calls are started, but calls
/// already in flight are allowed to finish.
#[instrument(skip_all, fields(entries = entries.len(), max_workers = max_workers))]
pub async fn partition(
    classifier: &dyn MarketClassifier,
    entries: Vec<Keyed>,
    max_workers: usize,
    tracker: &ProgressTracker,
) -> Partition {
    let token = tracker.cancellation_token();
    let mut verdicts: Vec<Option<ClassifierResult<Verdict>>> = entries.iter().map(|_| None).collect();

    let mut results = stream::iter(entries.iter().enumerate())
        .take_while(move |_| future::ready(!token.is_cancelled()))
        .map(move |(index, keyed)| async move { (index, keyed, classifier.classify(&keyed.entry).await) })
        .buffer_unordered(max_workers.max(1));

    let mut processed = 0u64;
    while let Some((index, keyed, verdict)) = results.next().await {
        processed += 1;
        let outcome = match &verdict {
            Ok(_) => Outcome::Success,
            Err(err) => {
                tracing::warn!(raw_title = %keyed.entry.raw_title, error = %err, "Classification failed");
                tracker.add_error(format!("Classification failed for {}: {err}", keyed.entry.raw_title));
                Outcome::Failure
            },
        };
        tracker.update_phase(Phase::MarketFiltering, processed, &keyed.entry.raw_title, outcome);
        verdicts[index] = Some(verdict);
    }
    drop(results);

    let mut partition = Partition::default();
    for (keyed, verdict) in entries.into_iter().zip(verdicts) {
        match verdict {
            Some(Ok(Verdict::Allowed)) => partition.allowed.push(keyed),
            Some(Ok(Verdict::Excluded)) => partition.excluded.push(keyed),
            Some(Err(_)) => partition.failed.push(keyed),
            None => partition.skipped.push(keyed),
        }
    }
    tracing::debug!(
        allowed = partition.allowed.len(),
        excluded = partition.excluded.len(),
        failed = partition.failed.len(),
        skipped = partition.skipped.len(),
        "Classified entries"
    );
    partition
}
