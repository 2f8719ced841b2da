//! Item Resolver: extract, deduplicate, persist, mark handled

use crate::browser::{BrowserContext, BrowserError, BrowserResult};
use crate::config::{Config, SelectorConfig};
use crate::storage::{
    lock, InsertOutcome, NewListing, SharedStorage, Storage, WORK_FORMAT_NOT_APPLICABLE,
};
use crate::url::canonicalize_url;
use crate::{FailureKind, HarvestError, Result, UrlError};
use std::fmt;
use url::Url;

/// Where an item sits in the crawl; enough to reproduce a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPosition {
    pub search: u32,
    pub page: u32,
    /// 1-based, document order
    pub index: u32,
}

impl fmt::Display for ItemPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Search: {} Page: {} Card: {}",
            self.search, self.page, self.index
        )
    }
}

/// What happened to one rendered item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// New listing stored under this id
    Inserted(i64),
    /// URL was already stored; nothing written
    AlreadyKnown,
    /// The card was already marked handled on the page
    AlreadyHandled,
    /// A required sub-element was missing; item skipped
    ExtractionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub outcome: ItemOutcome,
    /// Whether the card was marked handled on the page by this call
    pub handled: bool,
    pub url: Option<String>,
}

impl ItemReport {
    fn skipped(outcome: ItemOutcome) -> Self {
        Self {
            outcome,
            handled: false,
            url: None,
        }
    }
}

/// Splits a location field into place and work format
///
/// `"São Paulo, Brasil (Remote)"` becomes `("São Paulo, Brasil", "Remote")`.
/// Without a parenthesised part the format is [`WORK_FORMAT_NOT_APPLICABLE`].
pub fn split_location(raw: &str) -> (String, String) {
    match raw.split_once('(') {
        Some((place, format)) => {
            let format = format.trim().trim_end_matches(')').trim();
            let format = if format.is_empty() {
                WORK_FORMAT_NOT_APPLICABLE
            } else {
                format
            };
            (place.trim().to_string(), format.to_string())
        }
        None => (raw.trim().to_string(), WORK_FORMAT_NOT_APPLICABLE.to_string()),
    }
}

fn is_transient(err: &HarvestError) -> bool {
    err.failure_kind() == Some(FailureKind::DomTransient)
        || matches!(err, HarvestError::UrlError(_))
}

/// Turns one rendered card into at most one stored listing
pub struct ItemResolver<S> {
    storage: SharedStorage<S>,
    platform: String,
    base: Url,
    keep_params: Vec<String>,
    selectors: SelectorConfig,
}

impl<S: Storage> ItemResolver<S> {
    pub fn new(storage: SharedStorage<S>, config: &Config) -> Result<Self> {
        let base = Url::parse(&config.site.base_url)
            .map_err(|e| UrlError::Parse(format!("{}: {}", config.site.base_url, e)))?;

        Ok(Self {
            storage,
            platform: config.site.platform.clone(),
            base,
            keep_params: config.site.canonical_keep_params.clone(),
            selectors: config.selectors.clone(),
        })
    }

    /// Resolves one item
    ///
    /// DOM failures while reading the card are absorbed into
    /// [`ItemOutcome::ExtractionFailed`]. Storage failures propagate.
    pub async fn resolve<B: BrowserContext>(
        &self,
        browser: &B,
        item: &B::Element,
        at: ItemPosition,
    ) -> Result<ItemReport> {
        let listing = match self.pending_listing(browser, item).await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                tracing::debug!("{} already handled, skipping", at);
                return Ok(ItemReport::skipped(ItemOutcome::AlreadyHandled));
            }
            Err(e) if is_transient(&e) => {
                tracing::warn!("{} extraction failed: {}", at, e);
                return Ok(ItemReport::skipped(ItemOutcome::ExtractionFailed));
            }
            Err(e) => return Err(e),
        };

        let outcome = self.persist(&listing)?;
        match outcome {
            ItemOutcome::Inserted(id) => tracing::info!(
                "{} New listing #{}: {} at {} ({})",
                at,
                id,
                listing.title,
                listing.company,
                listing.url
            ),
            _ => tracing::info!("{} Listing already stored: {}", at, listing.url),
        }

        let handled = self.mark_handled(browser, item, &listing.url, at).await?;
        Ok(ItemReport {
            outcome,
            handled,
            url: Some(listing.url),
        })
    }

    /// `None` when the card is already marked handled
    async fn pending_listing<B: BrowserContext>(
        &self,
        browser: &B,
        item: &B::Element,
    ) -> Result<Option<NewListing>> {
        browser.scroll_into_view(item).await?;
        if !self.is_pending(browser, item).await? {
            return Ok(None);
        }
        self.extract(browser, item).await.map(Some)
    }

    async fn is_pending<B: BrowserContext>(&self, browser: &B, item: &B::Element) -> Result<bool> {
        let icon = required(browser, item, &self.selectors.item_action_icon).await?;
        let reference = match browser.attribute(&icon, "href").await? {
            Some(href) => Some(href),
            None => browser.attribute(&icon, "xlink:href").await?,
        };
        Ok(reference.as_deref() == Some(self.selectors.pending_icon_ref.as_str()))
    }

    async fn extract<B: BrowserContext>(&self, browser: &B, item: &B::Element) -> Result<NewListing> {
        let s = &self.selectors;

        let link = required(browser, item, &s.item_title_link).await?;
        let href = browser
            .attribute(&link, "href")
            .await?
            .ok_or_else(|| BrowserError::NotFound(format!("{}[href]", s.item_title_link)))?;
        let title = browser
            .text(&required(browser, &link, &s.item_title_text).await?)
            .await?;
        let company = browser
            .text(&required(browser, item, &s.item_company).await?)
            .await?;
        let location = browser
            .text(&required(browser, item, &s.item_location).await?)
            .await?;

        let url = canonicalize_url(&href, Some(&self.base), &self.keep_params)?;
        let (location, work_format) = split_location(&location);

        Ok(NewListing {
            platform: self.platform.clone(),
            title: title.trim().to_string(),
            company: company.trim().to_string(),
            location,
            work_format,
            url: url.to_string(),
        })
    }

    fn persist(&self, listing: &NewListing) -> Result<ItemOutcome> {
        let mut storage = lock(&self.storage)?;
        if storage.listing_exists(&listing.url)? {
            return Ok(ItemOutcome::AlreadyKnown);
        }
        let outcome = match storage.insert_listing(listing)? {
            InsertOutcome::Inserted(id) => ItemOutcome::Inserted(id),
            InsertOutcome::Duplicate => ItemOutcome::AlreadyKnown,
        };
        Ok(outcome)
    }

    /// Dismisses the card; a stale control is re-located and retried once
    async fn mark_handled<B: BrowserContext>(
        &self,
        browser: &B,
        item: &B::Element,
        url: &str,
        at: ItemPosition,
    ) -> Result<bool> {
        match self.dismiss(browser, item).await {
            Ok(()) => return Ok(true),
            Err(BrowserError::Stale) => {
                tracing::debug!("{} dismiss control went stale, re-locating", at)
            }
            Err(e) if e.failure_kind() == FailureKind::DomTransient => {
                tracing::warn!("{} could not mark item handled: {}", at, e);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let retried = match self.relocate(browser, url).await {
            Ok(Some(fresh)) => self.dismiss(browser, &fresh).await,
            Ok(None) => Err(BrowserError::NotFound(url.to_string())),
            Err(e) => Err(e),
        };

        match retried {
            Ok(()) => Ok(true),
            Err(e) if e.failure_kind() == FailureKind::DomTransient => {
                tracing::warn!("{} leaving item unhandled after retry: {}", at, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dismiss<B: BrowserContext>(&self, browser: &B, item: &B::Element) -> BrowserResult<()> {
        let button = required(browser, item, &self.selectors.dismiss_button).await?;
        browser.js_click(&button).await
    }

    /// Finds the rendered card whose link canonicalizes to `url`
    async fn relocate<B: BrowserContext>(
        &self,
        browser: &B,
        url: &str,
    ) -> BrowserResult<Option<B::Element>> {
        for candidate in browser.find_all(&self.selectors.item).await? {
            let Ok(Some(link)) = browser
                .find_within(&candidate, &self.selectors.item_title_link)
                .await
            else {
                continue;
            };
            let Ok(Some(href)) = browser.attribute(&link, "href").await else {
                continue;
            };
            if let Ok(canonical) = canonicalize_url(&href, Some(&self.base), &self.keep_params) {
                if canonical.as_str() == url {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }
}

async fn required<B: BrowserContext>(
    browser: &B,
    parent: &B::Element,
    selector: &str,
) -> BrowserResult<B::Element> {
    browser
        .find_within(parent, selector)
        .await?
        .ok_or_else(|| BrowserError::NotFound(selector.to_string()))
}
