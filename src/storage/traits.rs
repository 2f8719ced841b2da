//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    IdentityRecord, InsertOutcome, ListingRecord, NewIdentity, NewListing, SessionArtifact,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Listing not found: {0}")]
    ListingNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every mutating operation runs in its own transactional scope: it either
/// commits completely or leaves no trace. The listing URL is a hard unique
/// key; a backend must never hold two listings with the same URL.
pub trait Storage {
    // ===== Identities =====

    /// Creates an identity; fails with `ConstraintViolation` if the email exists
    fn create_identity(&mut self, identity: &NewIdentity) -> StorageResult<i64>;

    /// Gets an identity by ID
    fn get_identity(&self, identity_id: i64) -> StorageResult<Option<IdentityRecord>>;

    /// Gets an identity by email
    fn get_identity_by_email(&self, email: &str) -> StorageResult<Option<IdentityRecord>>;

    // ===== Session Artifacts =====

    /// Loads the stored cookie blob for an (identity, platform) pair
    fn load_session_artifact(
        &self,
        identity_id: i64,
        platform: &str,
    ) -> StorageResult<Option<SessionArtifact>>;

    /// Saves a cookie blob, overwriting any previous artifact for the pair
    fn save_session_artifact(
        &mut self,
        identity_id: i64,
        platform: &str,
        cookies: &[u8],
    ) -> StorageResult<()>;

    // ===== Listings =====

    /// Checks whether a listing with this canonical URL exists
    fn listing_exists(&self, url: &str) -> StorageResult<bool>;

    /// Inserts a listing unless its URL is already known
    fn insert_listing(&mut self, listing: &NewListing) -> StorageResult<InsertOutcome>;

    /// Gets a listing by canonical URL
    fn get_listing_by_url(&self, url: &str) -> StorageResult<Option<ListingRecord>>;

    /// Gets listings not yet handled by the downstream consumer, oldest first
    fn get_unprocessed_listings(&self, limit: u32) -> StorageResult<Vec<ListingRecord>>;

    /// Flags a listing as processed and stamps the processing time
    fn mark_listing_processed(&mut self, listing_id: i64) -> StorageResult<()>;

    // ===== Statistics =====

    /// Gets total listing count
    fn count_listings(&self) -> StorageResult<u64>;

    /// Counts listings still awaiting the downstream consumer
    fn count_unprocessed_listings(&self) -> StorageResult<u64>;

    /// Listing counts per platform, sorted by platform
    fn count_listings_by_platform(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Counts stored identities
    fn count_identities(&self) -> StorageResult<u64>;

    /// Counts stored session artifacts
    fn count_session_artifacts(&self) -> StorageResult<u64>;
}
