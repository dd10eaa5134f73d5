//! Page-source collaborator contract
//!
//! The orchestrator drives pagination and dedup; everything that knows what
//! the target site's markup looks like sits behind this trait. Failure of
//! any operation surfaces as an error — an empty record list from a healthy
//! page and a failed extraction are never conflated.

use crate::source::SessionSlot;
use crate::storage::Record;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Navigates the slot to the given browse page number
    ///
    /// Returns `Ok(false)` when the page loaded but does not look like a
    /// browse page (pagination ran off the end); errors for transport
    /// failures.
    async fn navigate_to_page(&self, slot: &mut SessionSlot, page_number: u32) -> Result<bool>;

    /// Extracts record drafts from the slot's current browse page
    ///
    /// May legitimately be empty; a partial extraction must error instead.
    async fn list_records(&self, slot: &mut SessionSlot) -> Result<Vec<Record>>;

    /// Fetches the detail page for a record and returns its field map
    ///
    /// This is the heavier second fetch; the orchestrator merges the result
    /// into the draft and persists immediately.
    async fn enrich_record(
        &self,
        slot: &mut SessionSlot,
        source_id: &str,
    ) -> Result<HashMap<String, String>>;

    /// Whether the slot's current browse page advertises a further page
    fn has_next_page(&self, slot: &SessionSlot) -> Result<bool>;

    /// Best-effort total page count from the slot's current browse page
    fn total_pages(&self, slot: &SessionSlot) -> Option<u32>;
}
