//! Per-entry reconciliation against the pre-run snapshot.

use crate::classify::Verdict;
use std::path::Path;
use strm_cache::CacheRecord;

/// Everything known about one entry when deciding what to do with it.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub url: &'a str,
    /// The key is in the existing-media index.
    pub existing: bool,
    pub verdict: Verdict,
    /// What the previous run recorded for the key.
    pub prior: Option<&'a CacheRecord>,
    /// Absolute location the pointer file would be written to, when it could
    /// be resolved.
    pub target: Option<&'a Path>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Satisfied by local media; record `{url, None, allowed}`, no file.
    SkipExisting,
    /// The prior record still matches; carry it forward untouched.
    SkipUnchanged,
    /// Write the pointer file, then record its location.
    Write,
    /// Rejected by the classifier; record `{url, None, excluded}`.
    Exclude,
}

/// Decides what to do with one entry. Rules are checked in order: existing
/// media, classifier rejection, unchanged prior record, write.
///
/// A prior record only counts as unchanged when it was a written pointer for
/// the same URL at the same location. `force_regenerate` disables that rule.
pub fn decide(candidate: &Candidate<'_>, force_regenerate: bool) -> Decision {
    if candidate.existing {
        return Decision::SkipExisting;
    }
    if candidate.verdict == Verdict::Excluded {
        return Decision::Exclude;
    }
    let unchanged = candidate.prior.is_some_and(|prior| {
        prior.is_allowed()
            && prior.url() == candidate.url
            && prior.path().is_some()
            && prior.path() == candidate.target
    });
    match unchanged && !force_regenerate {
        true => Decision::SkipUnchanged,
        false => Decision::Write,
    }
}
