//! Stillharvest: a resumable image-gallery harvester
//!
//! This crate harvests records (images plus metadata) from a paginated,
//! authenticated gallery site, deduplicating against previously seen records,
//! downloading assets, and persisting everything durably enough to resume
//! after an interruption.

pub mod config;
pub mod crawler;
pub mod output;
pub mod source;
pub mod storage;

use thiserror::Error;

/// Main error type for stillharvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Navigation to page {page} failed")]
    Navigation { page: u32 },

    #[error("Extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Session pool is closed")]
    PoolClosed,

    #[error("Aborting after {count} consecutive page failures")]
    TooManyFailures { count: u32 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Result type alias for stillharvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, StopSignal};
pub use storage::{open_store, Record, RecordStore};
