//! SQLite record store implementation

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StoreResult};
use crate::storage::{Record, StoreStats};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;

/// SQLite record store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at the given path
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    fn get_attempts(&self, source_id: &str) -> StoreResult<u32> {
        let attempts: u32 = self.conn.query_row(
            "SELECT download_attempts FROM records WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }
}

impl RecordStore for SqliteStore {
    fn preload_existing_ids(&self) -> StoreResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT source_id FROM records")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    fn upsert(&mut self, record: &Record) -> StoreResult<bool> {
        let tags_json = serde_json::to_string(&record.tags)?;
        let metadata_json = serde_json::to_string(&record.metadata)?;

        // INSERT OR IGNORE makes re-insertion of an existing source id a
        // no-op rather than an error or a duplicate row.
        self.conn.execute(
            "INSERT OR IGNORE INTO records
             (source_id, title, description, asset_url, thumbnail_url,
              tags, metadata, work_title, director, cinematographer,
              year, genre, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.source_id,
                record.title,
                record.description,
                record.asset_url,
                record.thumbnail_url,
                tags_json,
                metadata_json,
                record.work_title,
                record.director,
                record.cinematographer,
                record.year,
                record.genre,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(true)
    }

    fn update_download_status(
        &mut self,
        source_id: &str,
        local_path: Option<&str>,
        success: bool,
        attempts: u32,
    ) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE records
             SET downloaded = ?1, local_path = ?2,
                 download_attempts = download_attempts + ?3
             WHERE source_id = ?4",
            params![success, local_path, attempts, source_id],
        )?;
        Ok(())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let total: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        let downloaded: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE downloaded = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreStats { total, downloaded })
    }
}
