//! Chrome backend over the DevTools protocol

use crate::browser::scripts::DOCUMENT_COMPLETE;
use crate::browser::{
    resolve_ws_url, BrowserContext, BrowserError, BrowserLauncher, BrowserResult, CookieBlob,
    POLL_INTERVAL,
};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Protocol messages that mean a node reference no longer points into the
/// live document
const STALE_MARKERS: &[&str] = &[
    "Could not find object with given id",
    "No node with given id",
    "does not belong to the document",
    "Node is detached",
    "detached from the document",
    "Cannot find context with specified id",
    "Execution context was destroyed",
];

/// Messages CDP returns when a selector matched nothing
const MISSING_MARKERS: &[&str] = &["Could not find node", "Not found"];

fn is_missing(err: &CdpError) -> bool {
    let msg = err.to_string();
    MISSING_MARKERS.iter().any(|m| msg.contains(m))
}

fn element_error(err: CdpError) -> BrowserError {
    let msg = err.to_string();
    if STALE_MARKERS.iter().any(|m| msg.contains(m)) {
        BrowserError::Stale
    } else {
        BrowserError::Protocol(msg)
    }
}

/// Cookie fields persisted between sessions
#[derive(Debug, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
}

impl From<Cookie> for StoredCookie {
    fn from(cookie: Cookie) -> Self {
        Self {
            name: cookie.name,
            value: cookie.value,
            domain: cookie.domain,
            path: cookie.path,
            secure: cookie.secure,
            http_only: cookie.http_only,
        }
    }
}

/// A single Chrome tab driven over CDP
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    /// Attached to a browser this process did not start; only the tab is ours
    remote: bool,
}

#[async_trait]
impl BrowserContext for ChromiumBrowser {
    type Element = Element;

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        tracing::debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn reload(&self) -> BrowserResult<()> {
        self.page
            .reload()
            .await
            .map_err(|e| BrowserError::Navigation(format!("reload: {}", e)))?;
        Ok(())
    }

    async fn wait_ready(&self, timeout: Duration) -> BrowserResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Evaluation fails while the old document is being torn down
            let ready = self
                .page
                .evaluate(DOCUMENT_COMPLETE)
                .await
                .ok()
                .and_then(|result| result.value().and_then(|v| v.as_bool()))
                .unwrap_or(false);

            if ready {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout("document ready state".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn find(&self, selector: &str) -> BrowserResult<Option<Element>> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(BrowserError::Protocol(e.to_string())),
        }
    }

    async fn find_all(&self, selector: &str) -> BrowserResult<Vec<Element>> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements),
            Err(e) if is_missing(&e) => Ok(Vec::new()),
            Err(e) => Err(BrowserError::Protocol(e.to_string())),
        }
    }

    async fn find_within(&self, parent: &Element, selector: &str) -> BrowserResult<Option<Element>> {
        match parent.find_element(selector).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(element_error(e)),
        }
    }

    async fn execute_script(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn text(&self, element: &Element) -> BrowserResult<String> {
        let text = element.inner_text().await.map_err(element_error)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(&self, element: &Element, name: &str) -> BrowserResult<Option<String>> {
        element.attribute(name).await.map_err(element_error)
    }

    async fn click(&self, element: &Element) -> BrowserResult<()> {
        element.click().await.map_err(element_error)?;
        Ok(())
    }

    async fn js_click(&self, element: &Element) -> BrowserResult<()> {
        element
            .call_js_fn("function() { this.click(); }", false)
            .await
            .map_err(element_error)?;
        Ok(())
    }

    async fn send_keys(&self, element: &Element, text: &str) -> BrowserResult<()> {
        element.click().await.map_err(element_error)?;
        element.type_str(text).await.map_err(element_error)?;
        Ok(())
    }

    async fn press_enter(&self, element: &Element) -> BrowserResult<()> {
        element.press_key("Enter").await.map_err(element_error)?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> BrowserResult<()> {
        element.scroll_into_view().await.map_err(element_error)?;
        Ok(())
    }

    async fn export_cookies(&self) -> BrowserResult<CookieBlob> {
        let cookies: Vec<StoredCookie> = self
            .page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .into_iter()
            .map(StoredCookie::from)
            .collect();

        tracing::debug!("Exported {} cookies", cookies.len());

        serde_json::to_vec(&cookies)
            .map(CookieBlob)
            .map_err(|e| BrowserError::Cookies(e.to_string()))
    }

    async fn import_cookies(&self, cookies: &CookieBlob) -> BrowserResult<()> {
        let stored: Vec<StoredCookie> = serde_json::from_slice(cookies.as_bytes())
            .map_err(|e| BrowserError::Cookies(e.to_string()))?;

        let mut params = Vec::with_capacity(stored.len());
        for cookie in stored {
            if cookie.name.is_empty() || cookie.domain.is_empty() {
                continue;
            }
            match CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value)
                .domain(cookie.domain)
                .path(cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build()
            {
                Ok(param) => params.push(param),
                Err(e) => tracing::warn!("Skipping cookie {}: {}", cookie.name, e),
            }
        }

        tracing::debug!("Injecting {} cookies", params.len());

        self.page
            .set_cookies(params)
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        if self.remote {
            if let Err(e) = self.page.clone().close().await {
                tracing::warn!("Failed to close remote tab: {}", e);
            }
        } else {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map_err(|e| BrowserError::Protocol(e.to_string()))?;
            if let Err(e) = browser.wait().await {
                tracing::warn!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.handler.abort();
        tracing::info!("Browser closed");
        Ok(())
    }
}

/// Starts a local Chrome or attaches to a running one
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn launch_config(&self) -> BrowserResult<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder().request_timeout(self.config.timeout());

        if let Some(executable) = &self.config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-infobars")
            .arg("--disable-popup-blocking")
            .arg("--disable-notifications")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        for arg in &self.config.args {
            builder = builder.arg(arg);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Browser = ChromiumBrowser;

    async fn launch(&self) -> BrowserResult<ChromiumBrowser> {
        let remote = self.config.remote_url.is_some();

        let (browser, mut handler) = match &self.config.remote_url {
            Some(remote_url) => {
                tracing::info!("Connecting to remote browser at {}", remote_url);
                let ws_url = resolve_ws_url(remote_url).await?;
                let handler_config = HandlerConfig {
                    request_timeout: self.config.timeout(),
                    ..Default::default()
                };
                Browser::connect_with_config(ws_url, handler_config)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?
            }
            None => {
                tracing::info!("Launching browser (headless={})", self.config.headless);
                Browser::launch(self.launch_config()?)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        Ok(ChromiumBrowser {
            browser: Mutex::new(browser),
            page,
            handler,
            remote,
        })
    }
}
