use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable consulted when `[auth] email` is absent
pub const EMAIL_ENV: &str = "STILLHARVEST_EMAIL";

/// Environment variable consulted when `[auth] password` is absent
pub const PASSWORD_ENV: &str = "STILLHARVEST_PASSWORD";

/// Loads and parses a configuration file from the given path
///
/// Credentials left empty in the `[auth]` section are filled from the
/// `STILLHARVEST_EMAIL` / `STILLHARVEST_PASSWORD` environment variables.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    resolve_credentials(&mut config)?;
    validate(&config)?;

    Ok(config)
}

/// Fills empty credential fields from the environment
fn resolve_credentials(config: &mut Config) -> Result<(), ConfigError> {
    if config.auth.email.is_empty() {
        config.auth.email = std::env::var(EMAIL_ENV)
            .map_err(|_| ConfigError::MissingCredential(EMAIL_ENV.to_string()))?;
    }

    if config.auth.password.is_empty() {
        config.auth.password = std::env::var(PASSWORD_ENV)
            .map_err(|_| ConfigError::MissingCredential(PASSWORD_ENV.to_string()))?;
    }

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is used to detect whether the configuration changed between runs.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
