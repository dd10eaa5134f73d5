//! Configuration loading and validation
//!
//! Configuration is a TOML file with kebab-case keys describing the target
//! site, extraction selectors, credentials, pool sizing, rate limits, the
//! download pipeline, and the record store.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash, EMAIL_ENV, PASSWORD_ENV};
pub use types::{
    AuthConfig, Config, DownloadConfig, HarvesterConfig, RateLimitConfig, SelectorConfig,
    SourceConfig, StorageConfig, UserAgentConfig,
};
pub use validation::validate;
