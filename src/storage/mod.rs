//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Identities with encrypted credentials
//! - Session artifacts (cookie snapshots) per identity and platform
//! - Listing records keyed by canonical URL

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the credential store and the crawl engine
///
/// The guard is never held across an `.await`.
pub type SharedStorage<S> = Arc<Mutex<S>>;

/// Wraps a backend for sharing
pub fn share<S: Storage>(storage: S) -> SharedStorage<S> {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage handle, mapping poisoning to a storage error
pub fn lock<S>(storage: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Work format recorded when the site does not embed one in the location
pub const WORK_FORMAT_NOT_APPLICABLE: &str = "N/A";

/// A persistent user identity
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Opaque ciphertext; only the secrets module can open it
    pub encrypted_password: Vec<u8>,
    pub profile: Option<serde_json::Value>,
    pub created_at: String,
}

/// Input for creating an identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub encrypted_password: Vec<u8>,
    pub profile: Option<serde_json::Value>,
}

/// Durable cookie snapshot for an (identity, platform) pair
#[derive(Debug, Clone)]
pub struct SessionArtifact {
    pub identity_id: i64,
    pub platform: String,
    /// Uninterpreted cookie blob produced by the browser backend
    pub cookies: Vec<u8>,
    pub active: bool,
    pub updated_at: String,
}

/// A listing extracted from a result page, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub platform: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub work_format: String,
    /// Canonical URL, the deduplication key
    pub url: String,
}

/// A stored listing
#[derive(Debug, Clone)]
pub struct ListingRecord {
    pub id: i64,
    pub platform: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub work_format: String,
    pub url: String,
    pub processed: bool,
    pub description: Option<String>,
    pub discovered_at: String,
    pub processed_at: Option<String>,
}

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}
