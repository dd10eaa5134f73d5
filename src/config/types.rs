use serde::Deserialize;

/// Main configuration structure for stillharvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub harvester: HarvesterConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub downloads: DownloadConfig,
    pub storage: StorageConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Target site layout
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Site root, e.g. "https://gallery.example.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the paginated browse view, relative to the base URL
    #[serde(rename = "browse-path")]
    pub browse_path: String,

    /// Path of the login form
    #[serde(rename = "login-path")]
    pub login_path: String,

    /// Detail page path with a `{id}` placeholder, e.g. "/stills/{id}"
    #[serde(rename = "detail-path-template")]
    pub detail_path_template: String,
}

/// CSS selectors driving extraction from the browse and detail pages
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// One element per record on a browse page
    #[serde(rename = "record-container")]
    pub record_container: String,

    /// Anchor inside a container whose href ends with the source id
    #[serde(rename = "record-link")]
    pub record_link: String,

    /// Image inside a container; `src` is the asset URL
    #[serde(rename = "record-image")]
    pub record_image: String,

    /// Title element inside a container (falls back to the image alt text)
    #[serde(rename = "record-title")]
    pub record_title: String,

    /// Description element inside a container
    #[serde(rename = "record-description")]
    pub record_description: String,

    /// Tag elements inside a container
    #[serde(rename = "record-tag")]
    pub record_tag: String,

    /// Label/value group on a detail page
    #[serde(rename = "detail-group")]
    pub detail_group: String,

    /// Label element within a detail group
    #[serde(rename = "detail-label")]
    pub detail_label: String,

    /// Value element within a detail group
    #[serde(rename = "detail-value")]
    pub detail_value: String,

    /// Full-size image on a detail page
    #[serde(rename = "detail-image")]
    pub detail_image: String,

    /// Element present only while logged in
    #[serde(rename = "logged-in-marker")]
    pub logged_in_marker: String,

    /// Element carrying a login failure message
    #[serde(rename = "login-error")]
    pub login_error: String,

    /// Enabled next-page control on a browse page
    #[serde(rename = "next-page")]
    pub next_page: String,

    /// Element announcing the total page count, if the site has one
    #[serde(rename = "total-pages")]
    pub total_pages: Option<String>,
}

/// Login credentials; empty fields fall back to environment variables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

/// Harvest loop behavior
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Number of sessions in the pool
    #[serde(rename = "pool-size", default = "default_pool_size")]
    pub pool_size: u32,

    /// Page handles created per session
    #[serde(rename = "pages-per-session", default = "default_pages_per_session")]
    pub pages_per_session: u32,

    /// Pause between per-record detail fetches (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Consecutive page failures before the run aborts
    #[serde(
        rename = "max-consecutive-failures",
        default = "default_max_consecutive_failures"
    )]
    pub max_consecutive_failures: u32,

    /// Stop after this many pages (unbounded when absent)
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u32>,
}

/// Request throttling
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Sliding-window ceiling on requests per minute
    #[serde(
        rename = "max-requests-per-minute",
        default = "default_max_requests_per_minute"
    )]
    pub max_requests_per_minute: u32,

    /// Multiplier applied per consecutive error
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

/// Asset download pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Whether assets are downloaded at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory receiving downloaded assets
    pub directory: String,

    /// Concurrent download ceiling (independent of the session pool)
    #[serde(
        rename = "concurrent-downloads",
        default = "default_concurrent_downloads"
    )]
    pub concurrent_downloads: u32,

    /// Tries per asset before reporting a permanent failure
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

/// Record store selection
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "sqlite:<path>" or "memory"
    #[serde(rename = "database-url")]
    pub database_url: String,
}

/// Identification sent with every request
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub agent: String,
}

fn default_pool_size() -> u32 {
    3
}

fn default_pages_per_session() -> u32 {
    2
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_max_requests_per_minute() -> u32 {
    60
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_concurrent_downloads() -> u32 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}
