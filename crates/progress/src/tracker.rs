//! The shared progress tracker.

use crate::report::{Completion, RunReport};
use crate::stats::{Counters, ProcessingStats, StatsDelta};
use crate::{Outcome, Phase, PhaseProgress, Tally, Verbosity};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Point-in-time view of a run, delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Option<Phase>,
    pub progress: Option<PhaseProgress>,
    pub overall_percent: f64,
    pub counters: Counters,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct State {
    phases: [PhaseProgress; Phase::ALL.len()],
    current: Option<Phase>,
    stats: ProcessingStats,
    observers: Vec<mpsc::Sender<Snapshot>>,
    dropped: u64,
}
impl State {
    fn overall_percent(&self) -> f64 {
        let started: Vec<_> = self.phases.iter().filter(|p| p.is_started()).collect();
        if started.is_empty() {
            return 0.0;
        }
        started.iter().map(|p| p.percent()).sum::<f64>() / started.len() as f64
    }
}

/// Thread-safe progress tracking for one run.
///
/// Shared as an `Arc<ProgressTracker>` between the pipeline, its workers and
/// whatever displays progress. All state sits behind one mutex; no method
/// calls another while holding it.
///
/// Observers get a bounded channel each. Publishing never blocks: a full
/// channel misses that notification, a closed one is dropped from the list.
///
/// ```
/// use strm_progress::{Outcome, Phase, ProgressTracker, Verbosity};
///
/// let tracker = ProgressTracker::new(Verbosity::Quiet);
/// tracker.start_phase(Phase::ParsingPlaylist, 2);
/// tracker.update_phase(Phase::ParsingPlaylist, 1, "The Matrix (1999)", Outcome::Success);
/// tracker.update_phase(Phase::ParsingPlaylist, 2, "Heat (1995)", Outcome::Skipped);
/// tracker.complete_phase(Phase::ParsingPlaylist);
///
/// let progress = tracker.phase(Phase::ParsingPlaylist).unwrap();
/// assert_eq!((progress.processed, progress.success, progress.skipped), (2, 1, 1));
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    verbosity: Verbosity,
    started: Instant,
    token: CancellationToken,
    state: Mutex<State>,
}

impl ProgressTracker {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            started: Instant::now(),
            token: CancellationToken::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// A panic while holding the lock leaves counters that are still usable
    /// for reporting, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    // =========================================================================
    // Phases
    // =========================================================================

    /// Start (or restart, resetting its counters) a phase.
    pub fn start_phase(&self, phase: Phase, total: u64) {
        let mut state = self.lock();
        state.phases[phase.index()] = PhaseProgress::start(total);
        state.current = Some(phase);
        if self.verbosity.shows_phases() {
            tracing::info!(%phase, total, "Starting phase");
        } else {
            tracing::debug!(%phase, total, "Starting phase");
        }
        self.publish(&mut state);
    }

    /// Set a phase's total once it becomes known after the phase started.
    pub fn set_total(&self, phase: Phase, total: u64) {
        let mut state = self.lock();
        let progress = &mut state.phases[phase.index()];
        if !progress.is_started() {
            return;
        }
        progress.total = total;
        self.publish(&mut state);
    }

    /// Record one processed item. `processed` is the caller's running count;
    /// it never moves backwards. Updates for phases that haven't started are
    /// ignored.
    pub fn update_phase(&self, phase: Phase, processed: u64, item: &str, outcome: Outcome) {
        self.batch_update_phase(phase, processed, item, Tally::from(outcome));
    }

    /// Record several processed items at once.
    pub fn batch_update_phase(&self, phase: Phase, processed: u64, item: &str, tally: Tally) {
        let mut state = self.lock();
        let progress = &mut state.phases[phase.index()];
        if !progress.is_started() {
            tracing::trace!(%phase, "Ignoring update for a phase that hasn't started");
            return;
        }
        progress.record(processed, item, tally);
        self.publish(&mut state);
    }

    pub fn complete_phase(&self, phase: Phase) {
        let mut state = self.lock();
        let progress = &mut state.phases[phase.index()];
        if !progress.is_started() {
            return;
        }
        progress.completed_at = Some(Instant::now());
        let (elapsed, processed, rate) = (progress.elapsed(), progress.processed, progress.items_per_second);
        if self.verbosity.shows_phases() {
            tracing::info!(%phase, elapsed = ?elapsed, processed, per_second = rate, "Completed phase");
        } else {
            tracing::debug!(%phase, elapsed = ?elapsed, processed, "Completed phase");
        }
        self.publish(&mut state);
    }

    pub fn phase(&self, phase: Phase) -> Option<PhaseProgress> {
        let state = self.lock();
        let progress = &state.phases[phase.index()];
        progress.is_started().then(|| progress.clone())
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.lock().current
    }

    /// Mean completion of every started phase.
    pub fn overall_percent(&self) -> f64 {
        self.lock().overall_percent()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn update_stats(&self, delta: StatsDelta) {
        let mut state = self.lock();
        state.stats.counters += delta;
        self.publish(&mut state);
    }

    pub fn add_error(&self, message: impl Into<String>) {
        self.lock().stats.push_error(message.into());
    }

    pub fn stats(&self) -> ProcessingStats {
        self.lock().stats.clone()
    }

    pub fn counters(&self) -> Counters {
        self.lock().stats.counters
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register an observer. Snapshots beyond `capacity` unread ones are
    /// dropped for that observer only.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.lock().observers.push(tx);
        rx
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Notifications that were dropped because an observer's channel was full.
    pub fn dropped_notifications(&self) -> u64 {
        self.lock().dropped
    }

    fn publish(&self, state: &mut State) {
        if state.observers.is_empty() || self.token.is_cancelled() {
            return;
        }
        let snapshot = Snapshot {
            phase: state.current,
            progress: state.current.map(|p| state.phases[p.index()].clone()),
            overall_percent: state.overall_percent(),
            counters: state.stats.counters,
            elapsed: self.started.elapsed(),
        };
        let mut dropped = 0;
        state.observers.retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            },
            Err(TrySendError::Closed(_)) => false,
        });
        state.dropped += dropped;
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Request a graceful shutdown. Work in flight finishes; the pipeline
    /// stops at its next check. Observers get no further notifications.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown requested, finishing current work");
        }
        self.token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled by [`shutdown`](Self::shutdown), for `select!`-ing
    /// against long waits.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Structured summary. A run counts as cancelled when shutdown was
    /// requested, at whichever phase was current.
    pub fn report(&self) -> RunReport {
        let state = self.lock();
        let completion = match (self.token.is_cancelled(), state.current) {
            (true, Some(phase)) => Completion::Cancelled(phase),
            (true, None) => Completion::Cancelled(Phase::ScanningLocalMedia),
            (false, _) => Completion::Finished,
        };
        RunReport {
            completion,
            counters: state.stats.counters,
            phases: Phase::ALL
                .into_iter()
                .filter_map(|phase| {
                    let progress = &state.phases[phase.index()];
                    progress.is_started().then(|| (phase, progress.clone()))
                })
                .collect(),
            elapsed: self.started.elapsed(),
            recent_errors: state.stats.recent_errors().map(str::to_string).collect(),
            total_errors: state.stats.total_errors(),
            dropped_notifications: state.dropped,
        }
    }

    /// Human-readable summary of the run so far.
    pub fn summary(&self) -> String {
        self.report().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strm_playlist::Category;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Verbosity::Quiet)
    }

    #[test]
    fn test_restart_resets_counters() {
        let tracker = tracker();
        tracker.start_phase(Phase::CreatingPointers, 10);
        tracker.update_phase(Phase::CreatingPointers, 4, "a", Outcome::Failure);
        tracker.start_phase(Phase::CreatingPointers, 3);
        let progress = tracker.phase(Phase::CreatingPointers).unwrap();
        assert_eq!((progress.total, progress.processed, progress.failure), (3, 0, 0));
    }

    #[test]
    fn test_updates_before_start_are_ignored() {
        let tracker = tracker();
        tracker.update_phase(Phase::Cleanup, 1, "x", Outcome::Success);
        assert!(tracker.phase(Phase::Cleanup).is_none());
    }

    #[test]
    fn test_batch_update_adds_tally() {
        let tracker = tracker();
        tracker.start_phase(Phase::MarketFiltering, 100);
        tracker.batch_update_phase(Phase::MarketFiltering, 50, "", Tally { success: 40, failure: 2, skipped: 8 });
        tracker.batch_update_phase(Phase::MarketFiltering, 30, "late", Tally { success: 1, ..Tally::default() });
        let progress = tracker.phase(Phase::MarketFiltering).unwrap();
        assert_eq!(progress.processed, 50);
        assert_eq!((progress.success, progress.failure, progress.skipped), (41, 2, 8));
        assert_eq!(progress.percent(), 50.0);
    }

    #[test]
    fn test_concurrent_updates_are_consistent() {
        let tracker = Arc::new(tracker());
        tracker.start_phase(Phase::MarketFiltering, 800);
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        tracker.update_phase(Phase::MarketFiltering, worker * 100 + i, "item", Outcome::Success);
                        tracker.update_stats(StatsDelta::found(Category::Movie));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let progress = tracker.phase(Phase::MarketFiltering).unwrap();
        assert_eq!(progress.success, 800);
        assert_eq!(progress.processed, 799);
        assert_eq!(tracker.counters().movies_found, 800);
    }

    #[tokio::test]
    async fn test_observers_receive_snapshots() {
        let tracker = tracker();
        let mut rx = tracker.subscribe(8);
        tracker.start_phase(Phase::ParsingPlaylist, 1);
        tracker.update_phase(Phase::ParsingPlaylist, 1, "Heat", Outcome::Success);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.phase, Some(Phase::ParsingPlaylist));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.progress.unwrap().current_item, "Heat");
    }

    #[test]
    fn test_full_observer_never_blocks() {
        let tracker = tracker();
        let _rx = tracker.subscribe(1);
        tracker.start_phase(Phase::ParsingPlaylist, 10);
        for i in 1..=10 {
            tracker.update_phase(Phase::ParsingPlaylist, i, "", Outcome::Success);
        }
        assert_eq!(tracker.dropped_notifications(), 10);
        assert_eq!(tracker.observer_count(), 1);
    }

    #[test]
    fn test_closed_observers_are_pruned() {
        let tracker = tracker();
        let rx = tracker.subscribe(4);
        let _kept = tracker.subscribe(4);
        drop(rx);
        tracker.start_phase(Phase::Cleanup, 0);
        assert_eq!(tracker.observer_count(), 1);
    }

    #[test]
    fn test_shutdown_suppresses_notifications() {
        let tracker = tracker();
        let mut rx = tracker.subscribe(8);
        tracker.start_phase(Phase::CreatingPointers, 5);
        tracker.shutdown();
        tracker.update_phase(Phase::CreatingPointers, 1, "x", Outcome::Success);
        assert!(tracker.is_shutdown_requested());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        // State keeps updating for the final summary.
        assert_eq!(tracker.phase(Phase::CreatingPointers).unwrap().processed, 1);
        assert_eq!(tracker.report().completion, Completion::Cancelled(Phase::CreatingPointers));
    }

    #[test]
    fn test_report_includes_started_phases_and_errors() {
        let tracker = tracker();
        tracker.start_phase(Phase::ScanningLocalMedia, 0);
        tracker.complete_phase(Phase::ScanningLocalMedia);
        tracker.add_error("write failed: Movies/A/A.strm");
        let report = tracker.report();
        assert_eq!(report.completion, Completion::Finished);
        assert_eq!(report.phases.len(), 1);
        assert!(report.phases[0].1.is_complete());
        assert_eq!(report.recent_errors, vec!["write failed: Movies/A/A.strm".to_string()]);
        assert!(tracker.summary().contains("write failed"));
    }
}
