//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{ListingRecord, Storage};
use crate::HarvestError;

/// How many pending listings the summary shows
const PENDING_PREVIEW: u32 = 10;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of listings stored
    pub total_listings: u64,

    /// Listings not yet picked up by the downstream consumer
    pub unprocessed_listings: u64,

    /// Listing counts per platform, sorted by platform
    pub listings_by_platform: Vec<(String, u64)>,

    pub identities: u64,

    /// Stored cookie snapshots
    pub session_artifacts: u64,

    /// Oldest unprocessed listings
    pub pending_preview: Vec<ListingRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    Ok(HarvestStatistics {
        total_listings: storage.count_listings()?,
        unprocessed_listings: storage.count_unprocessed_listings()?,
        listings_by_platform: storage.count_listings_by_platform()?,
        identities: storage.count_identities()?,
        session_artifacts: storage.count_session_artifacts()?,
        pending_preview: storage.get_unprocessed_listings(PENDING_PREVIEW)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Listings stored: {}", stats.total_listings);
    println!("  Awaiting processing: {}", stats.unprocessed_listings);
    println!("  Identities: {}", stats.identities);
    println!("  Saved sessions: {}", stats.session_artifacts);
    println!();

    if !stats.listings_by_platform.is_empty() {
        println!("Listings by Platform:");
        for (platform, count) in &stats.listings_by_platform {
            let percentage = if stats.total_listings > 0 {
                (*count as f64 / stats.total_listings as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", platform, count, percentage);
        }
        println!();
    }

    if !stats.pending_preview.is_empty() {
        println!("Oldest Unprocessed ({}):", stats.pending_preview.len());
        for listing in &stats.pending_preview {
            println!(
                "  - [{}] {} at {}, {} ({})",
                listing.discovered_at,
                listing.title,
                listing.company,
                listing.location,
                listing.work_format
            );
            println!("    {}", listing.url);
        }
        println!();
    }

    println!(
        "Processed: {} / {} listings",
        stats.total_listings - stats.unprocessed_listings.min(stats.total_listings),
        stats.total_listings
    );
}
