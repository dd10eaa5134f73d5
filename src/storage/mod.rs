//! Record store for harvested metadata and download state
//!
//! This module owns the dedup/record contract: every harvested record is
//! keyed by its stable source id, re-inserting an existing id is a no-op,
//! and download outcomes are tracked per record so an interrupted run can
//! resume without re-fetching anything.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StoreError, StoreResult};

use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

/// Opens the record store named by a database URL
///
/// Accepts `"memory"` for an in-memory store or `"sqlite:<path>"` for the
/// SQLite backend. The caller never branches on which backend it got.
pub fn open_store(database_url: &str) -> Result<Box<dyn RecordStore + Send>, HarvestError> {
    if database_url == "memory" {
        return Ok(Box::new(MemoryStore::new()));
    }

    match database_url.strip_prefix("sqlite:") {
        Some(path) if !path.is_empty() => Ok(Box::new(SqliteStore::new(Path::new(path))?)),
        _ => Err(HarvestError::Store(StoreError::BadDatabaseUrl(
            database_url.to_string(),
        ))),
    }
}

/// One harvested item: an asset plus its metadata, keyed by the stable
/// identifier the source site assigns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable identifier from the source site; globally unique in the store
    pub source_id: String,
    pub title: String,
    pub description: String,
    /// Primary (full-size) asset URL
    pub asset_url: String,
    pub thumbnail_url: String,
    /// Ordered tag set; duplicates are dropped on insertion
    pub tags: Vec<String>,
    /// Free-form label/value pairs from the detail page
    pub metadata: HashMap<String, String>,
    pub work_title: Option<String>,
    pub director: Option<String>,
    pub cinematographer: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    /// Set once the asset has been downloaded
    pub local_path: Option<String>,
    pub download_attempts: u32,
    pub downloaded: bool,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Creates an empty record for a source id
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: String::new(),
            description: String::new(),
            asset_url: String::new(),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            metadata: HashMap::new(),
            work_title: None,
            director: None,
            cinematographer: None,
            year: None,
            genre: None,
            local_path: None,
            download_attempts: 0,
            downloaded: false,
            created_at: Utc::now(),
        }
    }

    /// Adds a tag, preserving order and dropping duplicates
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Merges detail-page fields into the record
    ///
    /// Recognized labels fill the typed fields; everything else lands in the
    /// free-form metadata map. An enrichment value never blanks out a field
    /// the browse page already filled.
    pub fn apply_details(&mut self, details: &HashMap<String, String>) {
        for (label, value) in details {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match label.to_lowercase().as_str() {
                "title" if self.title.is_empty() => self.title = value.to_string(),
                "title" => {
                    self.work_title.get_or_insert_with(|| value.to_string());
                }
                "description" if self.description.is_empty() => {
                    self.description = value.to_string()
                }
                "image" | "image url" => self.asset_url = value.to_string(),
                "movie" | "film" | "film title" => self.work_title = Some(value.to_string()),
                "director" => self.director = Some(value.to_string()),
                "cinematographer" => self.cinematographer = Some(value.to_string()),
                "year" => {
                    if let Ok(year) = value.parse::<i32>() {
                        self.year = Some(year);
                    }
                }
                "genre" => self.genre = Some(value.to_string()),
                "tags" | "keywords" => {
                    for tag in value.split(',') {
                        self.add_tag(tag.trim());
                    }
                }
                _ => {
                    self.metadata
                        .insert(label.to_string(), value.to_string());
                }
            }
        }
    }
}

/// Aggregate counts reported by a record store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Distinct records persisted
    pub total: u64,
    /// Records whose asset download succeeded
    pub downloaded: u64,
}
