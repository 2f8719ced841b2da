//! Output module for harvest reports
//!
//! Statistics over the persisted listing set, printed by the `stats` command.

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
