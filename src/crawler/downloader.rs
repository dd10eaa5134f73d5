//! Concurrent asset download pipeline
//!
//! Downloads are bounded by a semaphore, idempotent against files already
//! on disk, and retried with exponential backoff. A download never raises:
//! it reports a [`DownloadOutcome`] and the caller decides what to persist.

use crate::config::Config;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

const BACKOFF_BASE: Duration = Duration::from_secs(4);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// What happened to one asset download
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Path the asset lives at (or would live at) on disk
    pub local_path: String,
    pub success: bool,
    /// Fetch attempts actually made; zero when skipped
    pub attempts: u32,
    /// The file was already on disk and no fetch happened
    pub skipped: bool,
}

/// Shared download executor for asset files
pub struct FetchPipeline {
    client: Client,
    permits: Semaphore,
    directory: PathBuf,
    retry_attempts: u32,
    backoff_base: Duration,
}

impl FetchPipeline {
    pub fn new(config: &Config) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.agent.clone())
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            permits: Semaphore::new(config.downloads.concurrent_downloads as usize),
            directory: PathBuf::from(&config.downloads.directory),
            retry_attempts: config.downloads.retry_attempts,
            backoff_base: BACKOFF_BASE,
        })
    }

    /// Deterministic on-disk path for an asset URL
    ///
    /// The record key keeps files greppable; the URL hash keeps distinct
    /// assets for one record from colliding.
    pub fn asset_path(&self, record_key: &str, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let short_hash = hex::encode(&digest[..5]);
        let extension = extension_from_url(url).unwrap_or("jpg");
        self.directory
            .join(format!("{}_{}.{}", record_key, short_hash, extension))
    }

    /// Downloads one asset, retrying transient failures
    ///
    /// Skips the fetch entirely when the target file already exists.
    pub async fn download_asset(&self, record_key: &str, url: &str) -> DownloadOutcome {
        let path = self.asset_path(record_key, url);
        let local_path = path.to_string_lossy().to_string();

        // One permit per in-flight download
        let _permit = self.permits.acquire().await;

        if path.exists() {
            debug!(path = %local_path, "Asset already on disk, skipping");
            return DownloadOutcome {
                local_path,
                success: true,
                attempts: 0,
                skipped: true,
            };
        }

        for attempt in 1..=self.retry_attempts {
            match self.fetch_to_disk(url, &path).await {
                Ok(bytes) => {
                    debug!(url, bytes, attempt, "Asset downloaded");
                    return DownloadOutcome {
                        local_path,
                        success: true,
                        attempts: attempt,
                        skipped: false,
                    };
                }
                Err(message) => {
                    warn!(url, attempt, message, "Asset download failed");
                    if attempt < self.retry_attempts {
                        sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        DownloadOutcome {
            local_path,
            success: false,
            attempts: self.retry_attempts,
            skipped: false,
        }
    }

    async fn fetch_to_disk(&self, url: &str, path: &Path) -> Result<usize, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| e.to_string())?;

        Ok(bytes.len())
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1));
        scaled.min(BACKOFF_CAP)
    }
}

/// File extension from a URL path, when it looks like a real one
fn extension_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}
