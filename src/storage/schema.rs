//! Database schema definitions
//!
//! This module contains the SQL schema for the content store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Fetched pages keyed by normalized URL
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    mime TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    strategy TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_strategy ON pages(strategy);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
