//! Progress display on stderr.
//!
//! Consumes tracker snapshots from a bounded channel and drives a single
//! [`ProgressBar`], reset whenever a new phase starts. indicatif hides the bar
//! when stderr isn't a terminal.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use strm_progress::{Phase, Snapshot};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

const BAR_TEMPLATE: &str = "{spinner:.green} [{prefix}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {wide_msg}";
const COUNT_TEMPLATE: &str = "{spinner:.green} [{prefix}] {pos} processed {wide_msg}";

pub struct ProgressDisplay {
    bar: ProgressBar,
    task: JoinHandle<()>,
}
impl ProgressDisplay {
    pub fn spawn(mut snapshots: Receiver<Snapshot>) -> Self {
        let bar = ProgressBar::new(0);
        bar.enable_steady_tick(Duration::from_millis(120));
        let task = tokio::spawn({
            let bar = bar.clone();
            async move {
                let mut shown = None;
                while let Some(snapshot) = snapshots.recv().await {
                    apply(&bar, &mut shown, &snapshot);
                }
            }
        });
        Self { bar, task }
    }

    /// Stops listening and clears the bar so the summary starts on a clean line.
    pub fn finish(self) {
        self.task.abort();
        self.bar.finish_and_clear();
    }
}

fn style(total: u64) -> ProgressStyle {
    match total {
        0 => ProgressStyle::with_template(COUNT_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner()),
        _ => ProgressStyle::with_template(BAR_TEMPLATE)
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    }
}

/// Mirrors one snapshot onto the bar. Snapshots without an active phase are
/// ignored.
fn apply(bar: &ProgressBar, shown: &mut Option<(Phase, u64)>, snapshot: &Snapshot) {
    let (Some(phase), Some(progress)) = (snapshot.phase, snapshot.progress.as_ref()) else {
        return;
    };
    if *shown != Some((phase, progress.total)) {
        if shown.is_none_or(|(previous, _)| previous != phase) {
            bar.reset();
            bar.set_prefix(phase.to_string());
        }
        bar.set_style(style(progress.total));
        bar.set_length(progress.total);
        *shown = Some((phase, progress.total));
    }
    bar.set_position(progress.processed);
    bar.set_message(progress.current_item.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use strm_progress::{Outcome, ProgressTracker, Verbosity};

    #[tokio::test]
    async fn test_bar_follows_snapshots() {
        let tracker = ProgressTracker::new(Verbosity::Quiet);
        let mut rx = tracker.subscribe(8);
        let bar = ProgressBar::hidden();
        let mut shown = None;

        tracker.start_phase(Phase::CreatingPointers, 4);
        apply(&bar, &mut shown, &rx.recv().await.unwrap());
        assert_eq!(bar.prefix(), "Creating Pointers");
        assert_eq!(bar.length(), Some(4));
        assert_eq!(bar.position(), 0);

        tracker.update_phase(Phase::CreatingPointers, 1, "Heat (1995)", Outcome::Success);
        apply(&bar, &mut shown, &rx.recv().await.unwrap());
        assert_eq!(bar.position(), 1);
        assert_eq!(bar.message(), "Heat (1995)");
    }

    #[tokio::test]
    async fn test_new_phase_resets_the_bar() {
        let tracker = ProgressTracker::new(Verbosity::Quiet);
        let mut rx = tracker.subscribe(8);
        let bar = ProgressBar::hidden();
        let mut shown = None;

        tracker.start_phase(Phase::CreatingPointers, 2);
        tracker.update_phase(Phase::CreatingPointers, 2, "Up", Outcome::Success);
        tracker.start_phase(Phase::Cleanup, 0);
        while let Ok(snapshot) = rx.try_recv() {
            apply(&bar, &mut shown, &snapshot);
        }
        assert_eq!(bar.prefix(), "Cleanup");
        assert_eq!(bar.length(), Some(0));
        assert_eq!(bar.position(), 0);
        assert_eq!(shown, Some((Phase::Cleanup, 0)));
    }
}
