//! Library Error Types
//!
//! Only failures that abort a run surface here. Problems with a single entry
//! (a pointer file that can't be written, a classifier that times out) are
//! logged, counted by the progress tracker and the run carries on.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("issue with path generation from template")]
    Template,
    /// The cache store could not be read or written.
    #[display("cache store failure")]
    Store,
    /// A storage backend could not be set up or used.
    #[display("storage failure")]
    Storage,
    #[display("could not write the excluded entries report")]
    Report,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Report)
    }
}
