use derive_more::AddAssign;
use std::collections::VecDeque;
use strm_playlist::Category;

const MAX_RECENT_ERRORS: usize = 50;

/// Additive run counters.
///
/// Used both as the running totals and as the delta passed to
/// [`update_stats`](crate::ProgressTracker::update_stats); any field left at
/// zero leaves the total unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AddAssign)]
pub struct Counters {
    pub movies_found: u64,
    pub movies_allowed: u64,
    pub movies_excluded: u64,
    pub tv_episodes_found: u64,
    pub tv_episodes_allowed: u64,
    pub tv_episodes_excluded: u64,
    pub documentaries_found: u64,
    pub documentaries_allowed: u64,
    pub documentaries_excluded: u64,
    pub strm_created: u64,
    pub strm_skipped: u64,
    pub strm_orphaned: u64,
    pub strm_failed: u64,
    pub cleanup_failed: u64,
}

pub type StatsDelta = Counters;

impl Counters {
    /// One entry of `category` found. Categories without a pointer layout
    /// aren't counted.
    pub fn found(category: Category) -> Self {
        let mut delta = Self::default();
        if let Some(field) = delta.per_category(category).map(|(found, _, _)| found) {
            *field = 1;
        }
        delta
    }

    pub fn allowed(category: Category) -> Self {
        let mut delta = Self::default();
        if let Some(field) = delta.per_category(category).map(|(_, allowed, _)| allowed) {
            *field = 1;
        }
        delta
    }

    pub fn excluded(category: Category) -> Self {
        let mut delta = Self::default();
        if let Some(field) = delta.per_category(category).map(|(_, _, excluded)| excluded) {
            *field = 1;
        }
        delta
    }

    fn per_category(&mut self, category: Category) -> Option<(&mut u64, &mut u64, &mut u64)> {
        match category {
            Category::Movie => Some((&mut self.movies_found, &mut self.movies_allowed, &mut self.movies_excluded)),
            Category::TvShow => {
                Some((&mut self.tv_episodes_found, &mut self.tv_episodes_allowed, &mut self.tv_episodes_excluded))
            },
            Category::Documentary => Some((
                &mut self.documentaries_found,
                &mut self.documentaries_allowed,
                &mut self.documentaries_excluded,
            )),
            Category::Replay | Category::Unknown => None,
        }
    }

    pub fn total_found(&self) -> u64 {
        self.movies_found + self.tv_episodes_found + self.documentaries_found
    }

    pub fn total_allowed(&self) -> u64 {
        self.movies_allowed + self.tv_episodes_allowed + self.documentaries_allowed
    }

    pub fn total_excluded(&self) -> u64 {
        self.movies_excluded + self.tv_episodes_excluded + self.documentaries_excluded
    }
}

/// Run statistics: counters plus the most recent error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub counters: Counters,
    recent_errors: VecDeque<String>,
    total_errors: u64,
}
impl ProcessingStats {
    pub(crate) fn push_error(&mut self, message: String) {
        if self.recent_errors.len() == MAX_RECENT_ERRORS {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message);
        self.total_errors += 1;
    }

    /// Oldest first, at most the last 50.
    pub fn recent_errors(&self) -> impl ExactSizeIterator<Item = &str> {
        self.recent_errors.iter().map(String::as_str)
    }

    /// Every error ever added, including those no longer retained.
    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_add_up() {
        let mut counters = Counters::default();
        counters += Counters::found(Category::Movie);
        counters += Counters::found(Category::Movie);
        counters += Counters::excluded(Category::TvShow);
        counters += Counters { strm_created: 3, ..Counters::default() };
        assert_eq!(counters.movies_found, 2);
        assert_eq!(counters.tv_episodes_excluded, 1);
        assert_eq!(counters.strm_created, 3);
        assert_eq!(counters.total_found(), 2);
        assert_eq!(counters.total_excluded(), 1);
    }

    #[test]
    fn test_categories_without_layout_are_not_counted() {
        assert_eq!(Counters::found(Category::Replay), Counters::default());
        assert_eq!(Counters::allowed(Category::Unknown), Counters::default());
    }

    #[test]
    fn test_error_ring_keeps_latest() {
        let mut stats = ProcessingStats::default();
        for i in 0..60 {
            stats.push_error(format!("error {i}"));
        }
        assert_eq!(stats.total_errors(), 60);
        assert_eq!(stats.recent_errors().len(), 50);
        assert_eq!(stats.recent_errors().next(), Some("error 10"));
        assert_eq!(stats.recent_errors().last(), Some("error 59"));
    }
}
