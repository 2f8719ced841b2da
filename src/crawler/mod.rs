//! Crawl engine
//!
//! This module contains the harvesting logic:
//! - The result page walker with its pagination cursor
//! - The item resolver (extract, dedup, persist, dismiss)
//! - The supervisor that restarts the whole session on classified failures

mod cursor;
mod resolver;
mod supervisor;
mod walker;

pub use cursor::CrawlCursor;
pub use resolver::{split_location, ItemOutcome, ItemPosition, ItemReport, ItemResolver};
pub use supervisor::{Supervisor, SupervisorReport};
pub use walker::{WalkEnd, WalkReport, Walker};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Identifier attached to every log line of one supervisor iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation(Uuid);

impl Correlation {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Correlation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Cooperative shutdown request, checked between pages and iterations
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
