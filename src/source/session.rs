//! HTTP sessions and page handles
//!
//! A `Session` is a cookie-carrying HTTP client: one logged-in identity
//! against the target site. A `PageHandle` is a lightweight cursor over the
//! session: the URL it last visited and the document fetched from it. The
//! pool hands these out together as a `SessionSlot`.

use crate::{HarvestError, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One identity against the target site
pub struct Session {
    client: Client,
    base_url: Url,
    logged_in: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    /// Launches a session: builds the HTTP client with a cookie jar
    pub fn launch(base_url: &str, user_agent: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            logged_in: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a fresh page handle over this session
    pub fn new_page(&self) -> PageHandle {
        PageHandle {
            current_url: None,
            document: None,
            page_number: 0,
        }
    }

    /// Resolves a site-relative path against the base URL
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Fetches a URL and returns the response body
    ///
    /// Non-2xx statuses are errors; an empty body from a 200 is the
    /// caller's problem to interpret.
    pub async fn fetch(&self, url: &Url) -> Result<String> {
        if self.is_closed() {
            return Err(HarvestError::PoolClosed);
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Extraction {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        response.text().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })
    }

    /// Submits a form and returns the final response body, following
    /// redirects through the client's default policy
    pub async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> Result<String> {
        if self.is_closed() {
            return Err(HarvestError::PoolClosed);
        }

        let response = self
            .client
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url.to_string(),
                source,
            })?;

        response.text().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    pub fn set_logged_in(&self, value: bool) {
        self.logged_in.store(value, Ordering::Release);
    }

    /// Tears the session down; fetches after this fail
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// A cursor over a session: last visited URL plus its document
#[derive(Debug, Default)]
pub struct PageHandle {
    current_url: Option<Url>,
    document: Option<String>,
    page_number: u32,
}

impl PageHandle {
    /// Replaces the handle's document after a navigation
    pub fn load(&mut self, url: Url, document: String) {
        self.current_url = Some(url);
        self.document = Some(document);
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.current_url.as_ref()
    }

    /// The raw HTML of the last navigation, if any
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn set_page_number(&mut self, page_number: u32) {
        self.page_number = page_number;
    }
}

/// An owned pairing of one session and one page handle
///
/// Exclusively held by a single task between pool acquire and release.
pub struct SessionSlot {
    pub session: Arc<Session>,
    pub page: PageHandle,
}

impl SessionSlot {
    pub fn new(session: Arc<Session>) -> Self {
        let page = session.new_page();
        Self { session, page }
    }

    /// Navigates the slot's page handle to a URL
    pub async fn goto(&mut self, url: Url) -> Result<()> {
        let body = self.session.fetch(&url).await?;
        self.page.load(url, body);
        Ok(())
    }
}
