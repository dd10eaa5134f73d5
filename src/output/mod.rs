//! Run reporting

mod stats;

pub use stats::{print_store_statistics, HarvestStats};
