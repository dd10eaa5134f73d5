//! In-memory record store
//!
//! Keeps everything in a map. Selected with `database-url = "memory"`; also
//! the backend integration tests reach for when they do not care about
//! durability.

use crate::storage::traits::{RecordStore, StoreResult};
use crate::storage::{Record, StoreStats};
use std::collections::{HashMap, HashSet};

/// Non-durable record store backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, Record>,
    insertion_order: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stored record (test inspection)
    pub fn get(&self, source_id: &str) -> Option<&Record> {
        self.records.get(source_id)
    }

    /// Returns stored records in insertion order (test inspection)
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.records.get(id))
    }
}

impl RecordStore for MemoryStore {
    fn preload_existing_ids(&self) -> StoreResult<HashSet<String>> {
        Ok(self.records.keys().cloned().collect())
    }

    fn upsert(&mut self, record: &Record) -> StoreResult<bool> {
        if !self.records.contains_key(&record.source_id) {
            self.insertion_order.push(record.source_id.clone());
            self.records
                .insert(record.source_id.clone(), record.clone());
        }
        Ok(true)
    }

    fn update_download_status(
        &mut self,
        source_id: &str,
        local_path: Option<&str>,
        success: bool,
        attempts: u32,
    ) -> StoreResult<()> {
        if let Some(record) = self.records.get_mut(source_id) {
            record.downloaded = success;
            record.local_path = local_path.map(|p| p.to_string());
            record.download_attempts += attempts;
        }
        Ok(())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let downloaded = self.records.values().filter(|r| r.downloaded).count() as u64;
        Ok(StoreStats {
            total: self.records.len() as u64,
            downloaded,
        })
    }
}
