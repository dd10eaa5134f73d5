//! Run statistics
//!
//! Counters accumulated across a harvest run, logged as a summary when the
//! run ends regardless of how it ended.

use crate::storage::StoreStats;
use std::time::Instant;
use tracing::info;

/// Counters for one harvest run
#[derive(Debug)]
pub struct HarvestStats {
    pub pages_scraped: u64,
    pub records_found: u64,
    pub records_new: u64,
    pub records_downloaded: u64,
    pub download_failures: u64,
    pub errors: u64,
    started_at: Instant,
}

impl Default for HarvestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestStats {
    pub fn new() -> Self {
        Self {
            pages_scraped: 0,
            records_found: 0,
            records_new: 0,
            records_downloaded: 0,
            download_failures: 0,
            errors: 0,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Records harvested per minute over the run so far
    pub fn throughput_per_minute(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.records_new as f64 / elapsed * 60.0
    }

    /// Emits the end-of-run summary
    pub fn log_summary(&self) {
        info!(
            pages = self.pages_scraped,
            found = self.records_found,
            new = self.records_new,
            downloaded = self.records_downloaded,
            download_failures = self.download_failures,
            errors = self.errors,
            elapsed_secs = format!("{:.1}", self.elapsed_secs()),
            per_minute = format!("{:.1}", self.throughput_per_minute()),
            "Harvest finished"
        );
    }
}

/// Prints store contents for the `--stats` mode
pub fn print_store_statistics(stats: &StoreStats) {
    println!("Store statistics");
    println!("  Total records:      {}", stats.total);
    println!("  Downloaded assets:  {}", stats.downloaded);
    println!("  Pending downloads:  {}", stats.total - stats.downloaded);
}
