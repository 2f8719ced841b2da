//! In-memory pagination cursor
//!
//! Tracks just enough of the pagination sequence to detect termination and
//! desynchronization. Nothing here is persisted.

/// Position of the walker within the current search
#[derive(Debug, Default, Clone)]
pub struct CrawlCursor {
    search_count: u32,
    current_page: Option<u32>,
    total_pages: Option<u32>,
}

impl CrawlCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new search; returns its 1-based index
    pub fn begin_search(&mut self) -> u32 {
        self.search_count += 1;
        self.current_page = None;
        self.total_pages = None;
        self.search_count
    }

    /// Records the page number read from the active indicator
    ///
    /// Returns `false` if the page did not strictly advance, which means the
    /// last navigation silently failed and the walk must not continue.
    pub fn observe_page(&mut self, page: u32) -> bool {
        if matches!(self.current_page, Some(previous) if page <= previous) {
            return false;
        }
        self.current_page = Some(page);
        true
    }

    pub fn record_total(&mut self, total: u32) {
        self.total_pages = Some(total);
    }

    /// True once the observed page has reached the last known total
    pub fn is_last_page(&self) -> bool {
        matches!(
            (self.current_page, self.total_pages),
            (Some(current), Some(total)) if current >= total
        )
    }

    pub fn search_count(&self) -> u32 {
        self.search_count
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }
}
