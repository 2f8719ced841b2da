//! Browser automation module
//!
//! The crawl engine talks to the page only through [`BrowserContext`], so the
//! concrete automation backend is swappable. The production backend drives
//! Chrome over the DevTools protocol.

mod chromium;
mod remote;
pub mod scripts;

#[cfg(test)]
pub(crate) mod fake;

pub use chromium::{ChromiumBrowser, ChromiumLauncher};
pub use remote::resolve_ws_url;

use crate::FailureKind;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// How often `wait_for` re-probes the DOM
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors raised by the browser collaborator
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Element reference went stale")]
    Stale,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Failed to start browser: {0}")]
    Launch(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("Invalid cookie blob: {0}")]
    Cookies(String),
}

impl BrowserError {
    /// DOM-level misses are transient; anything else means the browsing
    /// context itself is suspect.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) | Self::Stale | Self::Timeout(_) | Self::Script(_) => {
                FailureKind::DomTransient
            }
            Self::Navigation(_) | Self::Launch(_) | Self::Protocol(_) | Self::Cookies(_) => {
                FailureKind::SessionFatal
            }
        }
    }
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Serialized cookie set; opaque outside the backend that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieBlob(pub Vec<u8>);

impl CookieBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A live, exclusively owned browsing context
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Handle to a rendered element; may go stale on re-render
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    async fn reload(&self) -> BrowserResult<()>;

    /// Waits for the current navigation to finish loading
    async fn wait_ready(&self, timeout: Duration) -> BrowserResult<()>;

    /// Looks up the first element matching `selector`; absence is not an error
    async fn find(&self, selector: &str) -> BrowserResult<Option<Self::Element>>;

    /// All elements matching `selector`, in document order
    async fn find_all(&self, selector: &str) -> BrowserResult<Vec<Self::Element>>;

    async fn find_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> BrowserResult<Option<Self::Element>>;

    /// Polls for `selector` until it appears or `timeout` elapses
    async fn wait_for(&self, selector: &str, timeout: Duration) -> BrowserResult<Self::Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(selector).await? {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn execute_script(&self, script: &str) -> BrowserResult<serde_json::Value>;

    /// Rendered text of an element, trimmed
    async fn text(&self, element: &Self::Element) -> BrowserResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str)
        -> BrowserResult<Option<String>>;

    /// Native click (scrolls into view, dispatches mouse events)
    async fn click(&self, element: &Self::Element) -> BrowserResult<()>;

    /// Script-dispatched click; works on controls covered by overlays
    async fn js_click(&self, element: &Self::Element) -> BrowserResult<()>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> BrowserResult<()>;

    async fn press_enter(&self, element: &Self::Element) -> BrowserResult<()>;

    async fn scroll_into_view(&self, element: &Self::Element) -> BrowserResult<()>;

    async fn export_cookies(&self) -> BrowserResult<CookieBlob>;

    async fn import_cookies(&self, cookies: &CookieBlob) -> BrowserResult<()>;

    /// Releases the context; the handle must not be used afterwards
    async fn close(&self) -> BrowserResult<()>;
}

/// Produces a fresh browsing context for each supervisor iteration
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Browser: BrowserContext;

    async fn launch(&self) -> BrowserResult<Self::Browser>;
}
