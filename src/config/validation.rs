use crate::config::types::{
    Config, DownloadConfig, HarvesterConfig, RateLimitConfig, SelectorConfig, SourceConfig,
    StorageConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_selector_config(&config.selectors)?;
    validate_harvester_config(&config.harvester)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_download_config(&config.downloads)?;
    validate_storage_config(&config.storage)?;

    if config.user_agent.agent.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the target site layout
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "https" && base.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base-url must be http(s), got scheme '{}'",
            base.scheme()
        )));
    }

    for (name, path) in [
        ("browse-path", &config.browse_path),
        ("login-path", &config.login_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must start with '/', got '{}'",
                name, path
            )));
        }
    }

    if !config.detail_path_template.contains("{id}") {
        return Err(ConfigError::Validation(format!(
            "detail-path-template must contain '{{id}}', got '{}'",
            config.detail_path_template
        )));
    }

    Ok(())
}

/// Validates every selector by actually parsing it
fn validate_selector_config(config: &SelectorConfig) -> Result<(), ConfigError> {
    let selectors = [
        &config.record_container,
        &config.record_link,
        &config.record_image,
        &config.record_title,
        &config.record_description,
        &config.record_tag,
        &config.detail_group,
        &config.detail_label,
        &config.detail_value,
        &config.detail_image,
        &config.logged_in_marker,
        &config.login_error,
        &config.next_page,
    ];

    for selector in selectors {
        check_selector(selector)?;
    }

    if let Some(total) = &config.total_pages {
        check_selector(total)?;
    }

    Ok(())
}

fn check_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })?;
    Ok(())
}

/// Validates harvest loop settings
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.pool_size < 1 || config.pool_size > 32 {
        return Err(ConfigError::Validation(format!(
            "pool-size must be between 1 and 32, got {}",
            config.pool_size
        )));
    }

    if config.pages_per_session < 1 || config.pages_per_session > 16 {
        return Err(ConfigError::Validation(format!(
            "pages-per-session must be between 1 and 16, got {}",
            config.pages_per_session
        )));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(format!(
            "max-consecutive-failures must be >= 1, got {}",
            config.max_consecutive_failures
        )));
    }

    if let Some(max_pages) = config.max_pages {
        if max_pages < 1 {
            return Err(ConfigError::Validation(
                "max-pages must be >= 1 when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates rate limiting settings
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_requests_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "max-requests-per-minute must be >= 1, got {}",
            config.max_requests_per_minute
        )));
    }

    if config.backoff_factor < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be >= 1.0, got {}",
            config.backoff_factor
        )));
    }

    Ok(())
}

/// Validates download pipeline settings
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "downloads.directory cannot be empty".to_string(),
        ));
    }

    if config.concurrent_downloads < 1 || config.concurrent_downloads > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrent-downloads must be between 1 and 100, got {}",
            config.concurrent_downloads
        )));
    }

    if config.retry_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry-attempts must be >= 1, got {}",
            config.retry_attempts
        )));
    }

    Ok(())
}

/// Validates the database URL shape; backend selection happens in storage
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_url == "memory" {
        return Ok(());
    }

    match config.database_url.strip_prefix("sqlite:") {
        Some(path) if !path.is_empty() => Ok(()),
        Some(_) => Err(ConfigError::Validation(
            "database-url 'sqlite:' requires a path".to_string(),
        )),
        None => Err(ConfigError::Validation(format!(
            "database-url must be 'memory' or 'sqlite:<path>', got '{}'",
            config.database_url
        ))),
    }
}
