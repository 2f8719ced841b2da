//! Crawl Supervisor
//!
//! Runs one Session + Walker pair per iteration and starts over with a fresh
//! browsing context whenever the pair fails with a classified error. There is
//! no backoff and no failure budget; restarts are idempotent because every
//! item goes through the dedup check again.

use crate::browser::BrowserLauncher;
use crate::config::Config;
use crate::crawler::{Correlation, CrawlCursor, ItemResolver, StopFlag, WalkReport, Walker};
use crate::credentials::CredentialStore;
use crate::session::{CaptchaSignal, Session};
use crate::storage::{SharedStorage, Storage};
use crate::url::{build_search_url, SearchFilters};
use crate::Result;
use std::sync::Arc;
use tracing::Instrument;

/// Totals across all iterations of one supervisor run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub iterations: u64,
    pub restarts: u64,
    pub completed_walks: u64,
    pub inserted: u64,
}

pub struct Supervisor<L, S> {
    launcher: L,
    credentials: CredentialStore<S>,
    storage: SharedStorage<S>,
    captcha: Arc<dyn CaptchaSignal>,
    config: Arc<Config>,
    filters: SearchFilters,
    stop: StopFlag,
    max_iterations: Option<u64>,
}

impl<L: BrowserLauncher, S: Storage> Supervisor<L, S> {
    pub fn new(
        launcher: L,
        credentials: CredentialStore<S>,
        storage: SharedStorage<S>,
        captcha: Arc<dyn CaptchaSignal>,
        config: Arc<Config>,
        filters: SearchFilters,
        stop: StopFlag,
    ) -> Self {
        Self {
            launcher,
            credentials,
            storage,
            captcha,
            config,
            filters,
            stop,
            max_iterations: None,
        }
    }

    /// Caps the number of iterations; unbounded by default
    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Loops until stopped, the iteration cap is hit, or an unclassified
    /// error occurs (returned as-is)
    pub async fn run(&self) -> Result<SupervisorReport> {
        let search_url = build_search_url(&self.config.site.search_url, &self.filters)?;
        let mut cursor = CrawlCursor::new();
        let mut report = SupervisorReport::default();

        tracing::info!("Harvesting {} from {}", self.config.site.platform, search_url);

        loop {
            if self.stop.is_raised() {
                tracing::info!("Stop requested, supervisor exiting");
                break;
            }
            if matches!(self.max_iterations, Some(max) if report.iterations >= max) {
                tracing::info!("Reached iteration limit ({})", report.iterations);
                break;
            }

            report.iterations += 1;
            let correlation = Correlation::new();
            let span = tracing::info_span!(
                "session",
                correlation = %correlation,
                iteration = report.iterations
            );

            let outcome = self
                .run_iteration(search_url.as_str(), &mut cursor, correlation)
                .instrument(span)
                .await;

            match outcome {
                Ok(walk) => {
                    report.completed_walks += 1;
                    report.inserted += walk.inserted;
                    tracing::info!(
                        correlation = %correlation,
                        "Iteration {} finished ({:?}), starting over",
                        report.iterations,
                        walk.end
                    );
                }
                Err(e) => match e.failure_kind() {
                    Some(kind) => {
                        report.restarts += 1;
                        tracing::warn!(
                            correlation = %correlation,
                            "Iteration {} failed ({:?}): {}; restarting session",
                            report.iterations,
                            kind,
                            e
                        );
                    }
                    None => {
                        tracing::error!(correlation = %correlation, "Unrecoverable failure: {}", e);
                        return Err(e);
                    }
                },
            }
        }

        tracing::info!(
            "Supervisor finished: {} iterations, {} restarts, {} new listings",
            report.iterations,
            report.restarts,
            report.inserted
        );
        Ok(report)
    }

    /// One scoped browsing context: acquired, used, and always released
    async fn run_iteration(
        &self,
        search_url: &str,
        cursor: &mut CrawlCursor,
        correlation: Correlation,
    ) -> Result<WalkReport> {
        let identity = self
            .credentials
            .identity_by_email(&self.config.identity.email)?;
        let browser = self.launcher.launch().await?;

        let mut session = Session::new(
            browser,
            identity,
            self.credentials.clone(),
            Arc::clone(&self.captcha),
            Arc::clone(&self.config),
            correlation,
        );

        let walked = self
            .authenticate_and_walk(&mut session, search_url, cursor, correlation)
            .await;
        let closed = session.close().await;

        match (walked, closed) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown)) => {
                tracing::warn!("Teardown after failure also failed: {}", teardown);
                Err(e)
            }
        }
    }

    async fn authenticate_and_walk(
        &self,
        session: &mut Session<L::Browser, S>,
        search_url: &str,
        cursor: &mut CrawlCursor,
        correlation: Correlation,
    ) -> Result<WalkReport> {
        session.authenticate().await?;

        let resolver = ItemResolver::new(Arc::clone(&self.storage), &self.config)?;
        let walker = Walker::new(resolver, Arc::clone(&self.config), self.stop.clone());
        walker
            .walk(session.browser(), search_url, cursor, correlation)
            .await
    }
}
