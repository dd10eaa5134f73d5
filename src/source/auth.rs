//! Login flow against the target site
//!
//! Sessions authenticate by submitting the site's login form; the cookie
//! jar on the session carries the resulting identity. Logged-in state is
//! verified by a configured marker element, and re-asserted mid-harvest
//! whenever a browse page comes back without it.

use crate::config::Config;
use crate::source::session::{Session, SessionSlot};
use crate::{ConfigError, ConfigResult, HarvestError, Result};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

/// Drives login and logged-in verification for sessions
pub struct LoginManager {
    email: String,
    password: String,
    login_path: String,
    logged_in_marker: Selector,
    login_error: Selector,
}

impl LoginManager {
    pub fn new(config: &Config) -> ConfigResult<Self> {
        let parse = |selector: &str| {
            Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
                selector: selector.to_string(),
                message: format!("{:?}", e),
            })
        };

        Ok(Self {
            email: config.auth.email.clone(),
            password: config.auth.password.clone(),
            login_path: config.source.login_path.clone(),
            logged_in_marker: parse(&config.selectors.logged_in_marker)?,
            login_error: parse(&config.selectors.login_error)?,
        })
    }

    /// Logs the session in by submitting the login form
    ///
    /// The response is judged by markup: a login-error element fails the
    /// attempt with the site's own message, and the logged-in marker must
    /// be present for success.
    pub async fn login(&self, session: &Session) -> Result<()> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(HarvestError::Auth(
                "No credentials configured".to_string(),
            ));
        }

        let login_url = session.resolve(&self.login_path)?;
        debug!(url = %login_url, "Submitting login form");

        // Prime the session's cookie jar before posting credentials
        session.fetch(&login_url).await?;

        let form = [
            ("email", self.email.as_str()),
            ("password", self.password.as_str()),
        ];
        let body = session.post_form(&login_url, &form).await?;

        self.check_login_response(&body)?;
        session.set_logged_in(true);
        info!(email = %self.email, "Logged in");
        Ok(())
    }

    /// Confirms the slot's current document still shows a logged-in view,
    /// logging in again when the site has dropped the session
    ///
    /// Returns whether a re-login was performed.
    pub async fn ensure_logged_in(&self, slot: &mut SessionSlot) -> Result<bool> {
        let marker_present = slot
            .page
            .document()
            .map(|html| self.marker_present(html))
            .unwrap_or(false);

        if marker_present {
            return Ok(false);
        }

        warn!("Session no longer logged in, re-authenticating");
        slot.session.set_logged_in(false);
        self.login(&slot.session).await?;
        Ok(true)
    }

    fn marker_present(&self, html: &str) -> bool {
        let document = Html::parse_document(html);
        document.select(&self.logged_in_marker).next().is_some()
    }

    fn check_login_response(&self, html: &str) -> Result<()> {
        let document = Html::parse_document(html);

        if let Some(error) = document.select(&self.login_error).next() {
            let message = error.text().collect::<String>().trim().to_string();
            let message = if message.is_empty() {
                "Login rejected".to_string()
            } else {
                message
            };
            return Err(HarvestError::Auth(message));
        }

        if document.select(&self.logged_in_marker).next().is_none() {
            return Err(HarvestError::Auth(
                "Login response did not show a logged-in view".to_string(),
            ));
        }

        Ok(())
    }
}
