//! Progress tracking for strmsync runs.
//!
//! A [`ProgressTracker`] follows the run through its fixed [`Phase`]s,
//! accumulates [`Counters`], keeps the most recent error messages and fans
//! out [`Snapshot`]s to observers. It also owns the run's cancellation token.

mod phase;
mod report;
mod stats;
mod tracker;
mod verbosity;

pub use crate::phase::{Outcome, Phase, PhaseProgress, Tally};
pub use crate::report::{Completion, RunReport};
pub use crate::stats::{Counters, ProcessingStats, StatsDelta};
pub use crate::tracker::{ProgressTracker, Snapshot};
pub use crate::verbosity::{UnknownVerbosity, Verbosity};
pub use tokio_util::sync::CancellationToken;
