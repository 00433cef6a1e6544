use derive_more::Display;
use std::time::{Duration, Instant};

const MAX_ITEM_CHARS: usize = 100;

/// Pipeline phases, in the order a run goes through them.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    #[display("Scanning Local Media")]
    ScanningLocalMedia,
    #[display("Parsing Playlist")]
    ParsingPlaylist,
    #[display("Market Filtering")]
    MarketFiltering,
    #[display("Creating Pointers")]
    CreatingPointers,
    #[display("Cleanup")]
    Cleanup,
}
impl Phase {
    pub const ALL: [Phase; 5] = [
        Self::ScanningLocalMedia,
        Self::ParsingPlaylist,
        Self::MarketFiltering,
        Self::CreatingPointers,
        Self::Cleanup,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Result of processing one item within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

/// Outcome counts reported in one go by
/// [`batch_update_phase`](crate::ProgressTracker::batch_update_phase).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub success: u64,
    pub failure: u64,
    pub skipped: u64,
}
impl From<Outcome> for Tally {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self { success: 1, ..Self::default() },
            Outcome::Failure => Self { failure: 1, ..Self::default() },
            Outcome::Skipped => Self { skipped: 1, ..Self::default() },
        }
    }
}

/// Progress of a single phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseProgress {
    pub total: u64,
    pub processed: u64,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub items_per_second: f64,
    pub current_item: String,
    pub success: u64,
    pub failure: u64,
    pub skipped: u64,
}
impl PhaseProgress {
    pub(crate) fn start(total: u64) -> Self {
        Self { total, started_at: Some(Instant::now()), ..Self::default() }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(started) => self.completed_at.unwrap_or_else(Instant::now).saturating_duration_since(started),
            None => Duration::ZERO,
        }
    }

    /// Completion percentage, clamped to 100. A phase with no known total is
    /// either done or not.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return if self.is_complete() { 100.0 } else { 0.0 };
        }
        (self.processed as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub(crate) fn record(&mut self, processed: u64, item: &str, tally: Tally) {
        // Concurrent workers may report out of order; never go backwards.
        self.processed = self.processed.max(processed);
        if !item.is_empty() {
            self.current_item = truncate_item(item);
        }
        self.success += tally.success;
        self.failure += tally.failure;
        self.skipped += tally.skipped;
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.items_per_second = self.processed as f64 / elapsed;
        }
    }
}

fn truncate_item(item: &str) -> String {
    match item.char_indices().nth(MAX_ITEM_CHARS) {
        Some((end, _)) => item[..end].to_string(),
        None => item.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_phases_are_ordered() {
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
        assert_eq!(Phase::ALL.iter().map(|p| p.index()).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_processed_is_monotonic() {
        let mut progress = PhaseProgress::start(10);
        progress.record(5, "five", Tally::from(Outcome::Success));
        progress.record(3, "three", Tally::from(Outcome::Success));
        assert_eq!(progress.processed, 5);
        assert_eq!(progress.success, 2);
        assert_eq!(progress.current_item, "three");
    }

    #[test]
    fn test_item_label_is_capped() {
        let mut progress = PhaseProgress::start(1);
        progress.record(1, &"é".repeat(250), Tally::default());
        assert_eq!(progress.current_item.chars().count(), 100);
    }

    #[rstest]
    #[case(0, 0, false, 0.0)]
    #[case(0, 0, true, 100.0)]
    #[case(4, 1, false, 25.0)]
    #[case(4, 9, false, 100.0)]
    fn test_percent(#[case] total: u64, #[case] processed: u64, #[case] complete: bool, #[case] expected: f64) {
        let mut progress = PhaseProgress::start(total);
        progress.processed = processed;
        if complete {
            progress.completed_at = Some(Instant::now());
        }
        assert_eq!(progress.percent(), expected);
    }
}
