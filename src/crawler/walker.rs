//! Result Page Walker
//!
//! Visits a search URL and drives pagination page by page until the results
//! are exhausted, the next control is missing, the page sequence stops
//! advancing, or a stop is requested. DOM misses never escape a walk; they
//! end it or are counted against a single item.

use crate::browser::{scripts, BrowserContext, BrowserError};
use crate::config::Config;
use crate::crawler::{
    Correlation, CrawlCursor, ItemOutcome, ItemPosition, ItemReport, ItemResolver, StopFlag,
};
use crate::storage::Storage;
use crate::url::parse_pagination_summary;
use crate::{FailureKind, Result};
use std::sync::Arc;

/// Why a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkEnd {
    /// The observed page reached the total
    #[default]
    Exhausted,
    /// No next-page control could be found or invoked
    NoNextControl,
    /// The active page indicator was missing or did not advance
    Desynchronized,
    /// The stop flag was raised
    Stopped,
}

/// Tally of one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub end: WalkEnd,
    pub pages: u32,
    pub inserted: u64,
    pub known: u64,
    pub already_handled: u64,
    pub failed: u64,
    /// Items stored or known but left pending on the page
    pub unhandled: u64,
}

impl WalkReport {
    fn record(&mut self, item: &ItemReport) {
        match item.outcome {
            ItemOutcome::Inserted(_) => self.inserted += 1,
            ItemOutcome::AlreadyKnown => self.known += 1,
            ItemOutcome::AlreadyHandled => self.already_handled += 1,
            ItemOutcome::ExtractionFailed => self.failed += 1,
        }
        if item.url.is_some() && !item.handled {
            self.unhandled += 1;
        }
    }
}

fn is_transient(err: &BrowserError) -> bool {
    err.failure_kind() == FailureKind::DomTransient
}

/// Looks up an optional control; DOM misses count as absence
async fn probe<B: BrowserContext>(browser: &B, selector: &str) -> Result<Option<B::Element>> {
    match browser.find(selector).await {
        Ok(found) => Ok(found),
        Err(e) if is_transient(&e) => {
            tracing::debug!("Probe for {} failed: {}", selector, e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct Walker<S> {
    resolver: ItemResolver<S>,
    config: Arc<Config>,
    stop: StopFlag,
}

impl<S: Storage> Walker<S> {
    pub fn new(resolver: ItemResolver<S>, config: Arc<Config>, stop: StopFlag) -> Self {
        Self {
            resolver,
            config,
            stop,
        }
    }

    /// Walks every result page of one search
    ///
    /// Errors returned here are session or persistence failures; the caller
    /// discards the browsing context.
    pub async fn walk<B: BrowserContext>(
        &self,
        browser: &B,
        search_url: &str,
        cursor: &mut CrawlCursor,
        correlation: Correlation,
    ) -> Result<WalkReport> {
        let search = cursor.begin_search();
        let mut report = WalkReport::default();

        tracing::info!(correlation = %correlation, "Starting search {}: {}", search, search_url);
        browser.navigate(search_url).await?;

        let end = loop {
            tokio::time::sleep(self.config.browser.settle_delay()).await;

            let Some(page) = self.active_page(browser).await? else {
                tracing::warn!("Active page indicator not found, ending walk");
                break WalkEnd::Desynchronized;
            };
            if !cursor.observe_page(page) {
                tracing::warn!(
                    "Page did not advance past {:?} (indicator shows {}), ending walk",
                    cursor.current_page(),
                    page
                );
                break WalkEnd::Desynchronized;
            }
            report.pages += 1;
            tracing::info!("Search: {} Page: {}", search, page);

            self.load_all_items(browser).await?;
            self.resolve_items(browser, search, page, &mut report).await?;
            self.reconcile_summary(browser, cursor, page).await?;

            if cursor.is_last_page() {
                tracing::info!("Reached last page ({})", page);
                break WalkEnd::Exhausted;
            }
            if self.stop.is_raised() {
                tracing::info!("Stop requested, ending walk after page {}", page);
                break WalkEnd::Stopped;
            }
            if !self.next_page(browser, page).await? {
                break WalkEnd::NoNextControl;
            }
        };

        report.end = end;
        tracing::info!(
            "Search {} ended ({:?}) after {} pages: {} new, {} known, {} failed",
            search,
            end,
            report.pages,
            report.inserted,
            report.known,
            report.failed
        );
        Ok(report)
    }

    /// Page number shown by the active indicator
    async fn active_page<B: BrowserContext>(&self, browser: &B) -> Result<Option<u32>> {
        let Some(indicator) = probe(browser, &self.config.selectors.active_page).await? else {
            return Ok(None);
        };

        let text = match browser.text(&indicator).await {
            Ok(text) => text,
            Err(e) if is_transient(&e) => {
                tracing::warn!("Failed to read active page indicator: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let page = text.trim().parse::<u32>().ok();
        if page.is_none() {
            tracing::warn!("Active page indicator is not a number: {:?}", text);
        }
        Ok(page)
    }

    /// Scrolls the results pane until no placeholders remain or the rendered
    /// item count stops growing
    async fn load_all_items<B: BrowserContext>(&self, browser: &B) -> Result<()> {
        let selectors = &self.config.selectors;
        let script = scripts::scroll_results(&selectors.results_container);
        let mut rendered = browser.find_all(&selectors.item).await?.len();

        for attempt in 1..=self.config.browser.scroll_attempts {
            if browser.find_all(&selectors.lazy_placeholder).await?.is_empty() {
                break;
            }

            match browser.execute_script(&script).await {
                Ok(_) => {}
                Err(e) if is_transient(&e) => {
                    tracing::warn!("Scroll attempt {} failed: {}", attempt, e);
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.config.browser.scroll_pause()).await;

            let now = browser.find_all(&selectors.item).await?.len();
            tracing::debug!("Scroll attempt {}: {} items rendered", attempt, now);
            if now <= rendered {
                break;
            }
            rendered = now;
        }
        Ok(())
    }

    async fn resolve_items<B: BrowserContext>(
        &self,
        browser: &B,
        search: u32,
        page: u32,
        report: &mut WalkReport,
    ) -> Result<()> {
        let selector = &self.config.selectors.item;

        match browser.wait_for(selector, self.config.browser.timeout()).await {
            Ok(_) => {}
            Err(e) if is_transient(&e) => {
                tracing::warn!("No items rendered on page {}: {}", page, e);
            }
            Err(e) => return Err(e.into()),
        }

        let items = browser.find_all(selector).await?;
        for (i, item) in items.iter().enumerate() {
            let at = ItemPosition {
                search,
                page,
                index: i as u32 + 1,
            };
            match self.resolver.resolve(browser, item, at).await {
                Ok(item_report) => report.record(&item_report),
                Err(e) if e.failure_kind() == Some(FailureKind::DomTransient) => {
                    tracing::warn!("{} failed: {}", at, e);
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Reads "(current, total)" from the summary text and records the total
    ///
    /// The observed page wins when the two disagree.
    async fn reconcile_summary<B: BrowserContext>(
        &self,
        browser: &B,
        cursor: &mut CrawlCursor,
        observed: u32,
    ) -> Result<()> {
        let script = scripts::text_content(&self.config.selectors.pagination_summary);
        let text = match browser.execute_script(&script).await {
            Ok(serde_json::Value::String(text)) => text,
            Ok(_) => {
                tracing::warn!("Pagination summary not found on page {}", observed);
                return Ok(());
            }
            Err(e) if is_transient(&e) => {
                tracing::warn!("Failed to read pagination summary: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match parse_pagination_summary(&text) {
            Some((indicated, total)) => {
                if indicated != observed {
                    tracing::warn!(
                        "Pagination desync: summary says page {} of {}, indicator shows {}; continuing from {}",
                        indicated,
                        total,
                        observed,
                        observed
                    );
                }
                cursor.record_total(total);
            }
            None => tracing::warn!("Could not parse pagination summary {:?}", text),
        }
        Ok(())
    }

    /// Clicks the control for `current + 1`; `false` when there is none
    ///
    /// The button labelled with the target page number is preferred; the
    /// active indicator's next sibling is the fallback.
    async fn next_page<B: BrowserContext>(&self, browser: &B, current: u32) -> Result<bool> {
        let selectors = &self.config.selectors;
        let Some(target) = current.checked_add(1) else {
            tracing::warn!("Page indicator {} has no successor", current);
            return Ok(false);
        };

        let button = match probe(browser, &selectors.next_page_button(target)).await? {
            Some(button) => Some(button),
            None => {
                tracing::debug!("No button labelled for page {}, trying sibling", target);
                probe(browser, &selectors.next_page_sibling).await?
            }
        };

        let Some(button) = button else {
            tracing::info!("No next page control after page {}", current);
            return Ok(false);
        };

        match browser.click(&button).await {
            Ok(()) => Ok(true),
            Err(e) if is_transient(&e) => {
                tracing::warn!("Failed to open page {}: {}", target, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
