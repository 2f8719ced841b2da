//! URL handling module for Job-Harvest
//!
//! This module provides listing URL canonicalization (the deduplication key),
//! search URL construction and pagination summary parsing.

mod normalize;
mod pagination;
mod search;

// Re-export main functions
pub use normalize::canonicalize_url;
pub use pagination::parse_pagination_summary;
pub use search::{build_search_url, SearchFilters};
