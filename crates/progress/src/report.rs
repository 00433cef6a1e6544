use crate::{Counters, Phase, PhaseProgress};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

const SUMMARY_ERRORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished,
    /// Shutdown was requested; the run stopped at the start of (or during)
    /// this phase.
    Cancelled(Phase),
}

/// Structured end-of-run summary. [`Display`] renders the human-readable
/// version printed by the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub completion: Completion,
    pub counters: Counters,
    pub phases: Vec<(Phase, PhaseProgress)>,
    pub elapsed: Duration,
    /// The most recent error messages, oldest first.
    pub recent_errors: Vec<String>,
    pub total_errors: u64,
    pub dropped_notifications: u64,
}
impl RunReport {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.completion, Completion::Cancelled(_))
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let c = &self.counters;
        match self.completion {
            Completion::Finished => writeln!(f, "Processing complete")?,
            Completion::Cancelled(phase) => writeln!(f, "Processing cancelled during: {phase}")?,
        }
        writeln!(f)?;
        writeln!(f, "Statistics:")?;
        writeln!(f, "  - Movies: {} found, {} allowed, {} excluded", c.movies_found, c.movies_allowed, c.movies_excluded)?;
        writeln!(
            f,
            "  - TV Shows: {} episodes, {} allowed, {} excluded",
            c.tv_episodes_found, c.tv_episodes_allowed, c.tv_episodes_excluded
        )?;
        writeln!(
            f,
            "  - Documentaries: {} found, {} allowed, {} excluded",
            c.documentaries_found, c.documentaries_allowed, c.documentaries_excluded
        )?;
        writeln!(f)?;
        writeln!(f, "Pointer files:")?;
        writeln!(f, "  - Created: {}", c.strm_created)?;
        writeln!(f, "  - Skipped: {}", c.strm_skipped)?;
        writeln!(f, "  - Orphaned: {}", c.strm_orphaned)?;
        writeln!(f, "  - Failed: {}", c.strm_failed)?;
        if c.cleanup_failed > 0 {
            writeln!(f, "  - Cleanup failures: {}", c.cleanup_failed)?;
        }
        writeln!(f)?;
        write!(f, "Runtime: {:.1} seconds", self.elapsed.as_secs_f64())?;
        if !self.recent_errors.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "Errors ({} total):", self.total_errors)?;
            let skip = self.recent_errors.len().saturating_sub(SUMMARY_ERRORS);
            for error in self.recent_errors.iter().skip(skip) {
                writeln!(f)?;
                write!(f, "  - {error}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            completion: Completion::Finished,
            counters: Counters { movies_found: 3, movies_allowed: 2, movies_excluded: 1, strm_created: 2, ..Counters::default() },
            phases: Vec::new(),
            elapsed: Duration::from_millis(1250),
            recent_errors: Vec::new(),
            total_errors: 0,
            dropped_notifications: 0,
        }
    }

    #[test]
    fn test_summary_lists_counts() {
        let text = report().to_string();
        assert!(text.starts_with("Processing complete\n"));
        assert!(text.contains("  - Movies: 3 found, 2 allowed, 1 excluded\n"));
        assert!(text.contains("  - Created: 2\n"));
        assert!(text.ends_with("Runtime: 1.2 seconds") || text.ends_with("Runtime: 1.3 seconds"));
        assert!(!text.contains("Errors"));
        assert!(!text.contains("Cleanup failures"));
    }

    #[test]
    fn test_summary_shows_last_five_errors() {
        let mut report = report();
        report.recent_errors = (1..=7).map(|i| format!("error {i}")).collect();
        report.total_errors = 7;
        let text = report.to_string();
        assert!(text.contains("Errors (7 total):"));
        assert!(!text.contains("error 2\n"));
        assert!(text.contains("  - error 3\n"));
        assert!(text.ends_with("  - error 7"));
    }

    #[test]
    fn test_cancelled_summary_names_phase() {
        let mut report = report();
        report.completion = Completion::Cancelled(Phase::CreatingPointers);
        assert!(report.is_cancelled());
        assert!(report.to_string().starts_with("Processing cancelled during: Creating Pointers\n"));
    }
}
