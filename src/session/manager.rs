//! Session Manager state machine

use crate::browser::{BrowserContext, BrowserError};
use crate::config::Config;
use crate::crawler::Correlation;
use crate::credentials::CredentialStore;
use crate::session::{CaptchaSignal, LoginError, SessionState};
use crate::storage::{IdentityRecord, Storage};
use crate::{HarvestError, Result};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

/// Exclusive owner of one browsing context for one supervisor iteration
pub struct Session<B, S> {
    browser: B,
    identity: IdentityRecord,
    credentials: CredentialStore<S>,
    captcha: Arc<dyn CaptchaSignal>,
    config: Arc<Config>,
    correlation: Correlation,
    state: SessionState,
}

impl<B: BrowserContext, S: Storage> Session<B, S> {
    pub fn new(
        browser: B,
        identity: IdentityRecord,
        credentials: CredentialStore<S>,
        captcha: Arc<dyn CaptchaSignal>,
        config: Arc<Config>,
        correlation: Correlation,
    ) -> Self {
        Self {
            browser,
            identity,
            credentials,
            captcha,
            config,
            correlation,
            state: SessionState::Start,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The live context; valid until [`Session::close`]
    pub fn browser(&self) -> &B {
        &self.browser
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            correlation = %self.correlation,
            "Session {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Drives the context to an authenticated state
    pub async fn authenticate(&mut self) -> Result<()> {
        tracing::info!(correlation = %self.correlation, "Starting login as {}", self.identity.email);
        self.browser.navigate(&self.config.site.base_url).await?;

        if self.inject_cookies().await? {
            self.transition(SessionState::Verifying);
            tokio::time::sleep(self.config.browser.settle_delay()).await;

            if self
                .browser
                .find(&self.config.selectors.authenticated_marker)
                .await?
                .is_some()
            {
                tracing::info!("Stored session is active, login not required");
                self.transition(SessionState::Authenticated);
                return Ok(());
            }
            tracing::info!("Stored session was not accepted, login required");
        }

        self.transition(SessionState::LoginRequired);
        self.submit_login_form().await?;
        self.transition(SessionState::FormSubmitted);

        self.browser
            .wait_ready(self.config.browser.timeout())
            .await
            .map_err(|e| match e {
                BrowserError::Timeout(what) => LoginError::Timeout(what).into(),
                other => HarvestError::from(other),
            })?;

        if self
            .browser
            .find(&self.config.selectors.captcha)
            .await?
            .is_some()
        {
            self.transition(SessionState::CaptchaPending);
            tracing::warn!("CAPTCHA detected, waiting for a human to solve it");
            self.captcha.wait_for_solution().await?;
            tracing::info!("CAPTCHA reported solved");
        } else {
            tracing::info!("No CAPTCHA detected");
        }

        self.transition(SessionState::Authenticated);
        Ok(())
    }

    /// Returns `true` if stored cookies were injected and the page reloaded
    async fn inject_cookies(&mut self) -> Result<bool> {
        let stored = self
            .credentials
            .load_cookies(self.identity.id, &self.config.site.platform)?;

        let Some(cookies) = stored else {
            tracing::info!("No stored session cookies for {}", self.identity.email);
            return Ok(false);
        };

        if let Err(e) = self.browser.import_cookies(&cookies).await {
            tracing::warn!("Failed to inject stored cookies: {}", e);
            return Ok(false);
        }

        self.browser.reload().await?;
        self.transition(SessionState::CookiesInjected);
        Ok(true)
    }

    async fn submit_login_form(&self) -> Result<()> {
        let timeout = self.config.browser.timeout();
        let selectors = &self.config.selectors;

        self.browser.navigate(&self.config.site.login_url).await?;
        tracing::info!("Filling login form");

        let username = self.login_field(&selectors.login_username, timeout).await?;
        let password_field = self.login_field(&selectors.login_password, timeout).await?;

        let browser = &self.browser;
        let email = self.identity.email.as_str();
        let (username, password_field) = (&username, &password_field);

        self.credentials
            .with_password(&self.identity, move |password| async move {
                browser.send_keys(username, email).await?;
                browser
                    .send_keys(password_field, password.expose_secret())
                    .await?;
                browser.press_enter(password_field).await?;
                Ok::<_, HarvestError>(())
            })
            .await?;

        tracing::info!("Login form submitted");
        Ok(())
    }

    async fn login_field(&self, selector: &str, timeout: Duration) -> Result<B::Element> {
        match self.browser.wait_for(selector, timeout).await {
            Ok(element) => Ok(element),
            Err(BrowserError::Timeout(_)) => {
                tracing::error!("Timeout waiting for login form element {}", selector);
                Err(LoginError::FormNotFound(selector.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flushes cookies (only from an authenticated context) and releases the
    /// browser on every path
    pub async fn close(self) -> Result<()> {
        let saved = if self.state == SessionState::Authenticated {
            self.save_cookies().await
        } else {
            tracing::debug!("Session ended in state {}, keeping stored cookies", self.state);
            Ok(())
        };

        let closed = self.browser.close().await;
        saved?;
        closed?;
        Ok(())
    }

    async fn save_cookies(&self) -> Result<()> {
        tracing::info!(correlation = %self.correlation, "Saving session cookies");
        let cookies = self.browser.export_cookies().await?;
        self.credentials
            .save_cookies(self.identity.id, &self.config.site.platform, &cookies)
    }
}
