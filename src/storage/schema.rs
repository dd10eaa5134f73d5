//! Database schema for the SQLite record store

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested records, one row per distinct source id
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL UNIQUE,
    title TEXT,
    description TEXT,
    asset_url TEXT,
    thumbnail_url TEXT,
    local_path TEXT,
    tags TEXT,
    metadata TEXT,
    work_title TEXT,
    director TEXT,
    cinematographer TEXT,
    year INTEGER,
    genre TEXT,
    created_at TEXT NOT NULL,
    downloaded INTEGER NOT NULL DEFAULT 0,
    download_attempts INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_records_source_id ON records(source_id);
CREATE INDEX IF NOT EXISTS idx_records_downloaded ON records(downloaded);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
