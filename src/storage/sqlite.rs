//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    IdentityRecord, InsertOutcome, ListingRecord, NewIdentity, NewListing, SessionArtifact,
};
use chrono::Utc;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

const LISTING_COLUMNS: &str = "id, platform, title, company, location, work_format, url,
     processed, description, discovered_at, processed_at";

const IDENTITY_COLUMNS: &str = "id, name, email, encrypted_password, profile, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; parent directories are created
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Database(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `op` inside a transaction: commit on `Ok`, rollback on `Err`
    fn scoped<T, F>(&self, label: &str, op: F) -> StorageResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StorageResult<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        tracing::trace!("Opened transaction: {}", label);

        match op(&tx) {
            Ok(value) => {
                tx.commit()?;
                tracing::trace!("Committed transaction: {}", label);
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!("Rollback of {} failed: {}", label, rollback_err);
                }
                tracing::error!("Rolled back transaction {} due to error: {}", label, e);
                Err(e)
            }
        }
    }
}

/// Only UNIQUE constraints; NOT NULL and foreign key failures are real errors
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<IdentityRecord> {
    let profile: Option<String> = row.get(4)?;
    Ok(IdentityRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        encrypted_password: row.get(3)?,
        profile: profile.and_then(|p| serde_json::from_str(&p).ok()),
        created_at: row.get(5)?,
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    Ok(ListingRecord {
        id: row.get(0)?,
        platform: row.get(1)?,
        title: row.get(2)?,
        company: row.get(3)?,
        location: row.get(4)?,
        work_format: row.get(5)?,
        url: row.get(6)?,
        processed: row.get::<_, i64>(7)? != 0,
        description: row.get(8)?,
        discovered_at: row.get(9)?,
        processed_at: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Identities =====

    fn create_identity(&mut self, identity: &NewIdentity) -> StorageResult<i64> {
        let profile = identity
            .profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.scoped("create_identity", |tx| {
            let now = Utc::now().to_rfc3339();
            tx.execute(
                "INSERT INTO identities (name, email, encrypted_password, profile, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    identity.name,
                    identity.email,
                    identity.encrypted_password,
                    profile,
                    now
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::ConstraintViolation(format!(
                        "identity with email {} already exists",
                        identity.email
                    ))
                } else {
                    StorageError::from(e)
                }
            })?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn get_identity(&self, identity_id: i64) -> StorageResult<Option<IdentityRecord>> {
        let identity = self
            .conn
            .query_row(
                &format!("SELECT {} FROM identities WHERE id = ?1", IDENTITY_COLUMNS),
                params![identity_id],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    fn get_identity_by_email(&self, email: &str) -> StorageResult<Option<IdentityRecord>> {
        let identity = self
            .conn
            .query_row(
                &format!("SELECT {} FROM identities WHERE email = ?1", IDENTITY_COLUMNS),
                params![email],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    // ===== Session Artifacts =====

    fn load_session_artifact(
        &self,
        identity_id: i64,
        platform: &str,
    ) -> StorageResult<Option<SessionArtifact>> {
        let artifact = self
            .conn
            .query_row(
                "SELECT identity_id, platform, cookies, active, updated_at
                 FROM session_artifacts WHERE identity_id = ?1 AND platform = ?2",
                params![identity_id, platform],
                |row| {
                    Ok(SessionArtifact {
                        identity_id: row.get(0)?,
                        platform: row.get(1)?,
                        cookies: row.get(2)?,
                        active: row.get::<_, i64>(3)? != 0,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(artifact)
    }

    fn save_session_artifact(
        &mut self,
        identity_id: i64,
        platform: &str,
        cookies: &[u8],
    ) -> StorageResult<()> {
        self.scoped("save_session_artifact", |tx| {
            let now = Utc::now().to_rfc3339();
            tx.execute(
                "INSERT INTO session_artifacts (identity_id, platform, cookies, active, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4)
                 ON CONFLICT(identity_id, platform)
                 DO UPDATE SET cookies = excluded.cookies, active = 1, updated_at = excluded.updated_at",
                params![identity_id, platform, cookies, now],
            )?;
            Ok(())
        })
    }

    // ===== Listings =====

    fn listing_exists(&self, url: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM listings WHERE url = ?1)",
            params![url],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_listing(&mut self, listing: &NewListing) -> StorageResult<InsertOutcome> {
        self.scoped("insert_listing", |tx| {
            let known: Option<i64> = tx
                .query_row(
                    "SELECT id FROM listings WHERE url = ?1",
                    params![listing.url],
                    |row| row.get(0),
                )
                .optional()?;

            if known.is_some() {
                return Ok(InsertOutcome::Duplicate);
            }

            let now = Utc::now().to_rfc3339();
            let inserted = tx.execute(
                "INSERT INTO listings (platform, title, company, location, work_format, url, discovered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    listing.platform,
                    listing.title,
                    listing.company,
                    listing.location,
                    listing.work_format,
                    listing.url,
                    now
                ],
            );

            match inserted {
                Ok(_) => Ok(InsertOutcome::Inserted(tx.last_insert_rowid())),
                // Another writer got there between the check and the insert
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn get_listing_by_url(&self, url: &str) -> StorageResult<Option<ListingRecord>> {
        let listing = self
            .conn
            .query_row(
                &format!("SELECT {} FROM listings WHERE url = ?1", LISTING_COLUMNS),
                params![url],
                listing_from_row,
            )
            .optional()?;
        Ok(listing)
    }

    fn get_unprocessed_listings(&self, limit: u32) -> StorageResult<Vec<ListingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM listings WHERE processed = 0 ORDER BY id ASC LIMIT ?1",
            LISTING_COLUMNS
        ))?;

        let listings = stmt
            .query_map(params![limit], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }

    fn mark_listing_processed(&mut self, listing_id: i64) -> StorageResult<()> {
        self.scoped("mark_listing_processed", |tx| {
            let now = Utc::now().to_rfc3339();
            let updated = tx.execute(
                "UPDATE listings SET processed = 1, processed_at = ?1 WHERE id = ?2",
                params![now, listing_id],
            )?;
            if updated == 0 {
                return Err(StorageError::ListingNotFound(listing_id));
            }
            Ok(())
        })
    }

    // ===== Statistics =====

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unprocessed_listings(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_listings_by_platform(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT platform, COUNT(*) FROM listings GROUP BY platform ORDER BY platform",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count_identities(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_session_artifacts(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM session_artifacts", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}
