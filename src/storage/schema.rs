//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Job-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Persistent user identities
CREATE TABLE IF NOT EXISTS identities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    encrypted_password BLOB NOT NULL,
    profile TEXT,
    created_at TEXT NOT NULL
);

-- One cookie snapshot per (identity, platform)
CREATE TABLE IF NOT EXISTS session_artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_id INTEGER NOT NULL REFERENCES identities(id),
    platform TEXT NOT NULL,
    cookies BLOB NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL,
    UNIQUE(identity_id, platform)
);

-- Harvested listings; url is the deduplication key
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    platform TEXT NOT NULL,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    location TEXT NOT NULL,
    work_format TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    processed INTEGER NOT NULL DEFAULT 0,
    description TEXT,
    discovered_at TEXT NOT NULL,
    processed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_listings_processed ON listings(processed);
CREATE INDEX IF NOT EXISTS idx_listings_platform ON listings(platform);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
