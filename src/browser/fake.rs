//! Scripted in-memory job site used by the engine tests
//!
//! `FakeSite` is the server side: result pages, dismissed cards and failure
//! injection, shared across every browsing context. `FakeBrowser` is one
//! context on that site: its own cookie jar, location and login form state.
//! Element handles from a page the context has navigated away from go stale.

use crate::browser::{
    scripts, BrowserContext, BrowserError, BrowserLauncher, BrowserResult, CookieBlob,
};
use crate::config::{parse_config, Config, SelectorConfig};
use crate::credentials::CredentialStore;
use crate::secrets::{generate_key, AesCipher};
use crate::storage::{share, SharedStorage, SqliteStorage};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub(crate) const EMAIL: &str = "bot@example.com";
pub(crate) const PASSWORD: &str = "correct horse battery staple";
pub(crate) const VALID_COOKIES: &[u8] = br#"[{"name":"li_at","value":"valid"}]"#;

const BASE_URL: &str = "https://jobs.test/";
const LOGIN_URL: &str = "https://jobs.test/login";
const SEARCH_URL: &str = "https://jobs.test/jobs/search/";
const DISMISSED_ICON: &str = "#undo-small";
const INITIALLY_RENDERED: usize = 1;
const RENDERED_PER_SCROLL: usize = 2;

/// Engine configuration pointing at the fake site with no settle delays
pub(crate) fn test_config() -> Config {
    let toml = format!(
        r#"
[site]
platform = "TestJobs"
base-url = "{BASE_URL}"
login-url = "{LOGIN_URL}"
search-url = "{SEARCH_URL}"

[identity]
email = "{EMAIL}"

[search]
location = "Brasil"

[browser]
timeout-secs = 1
settle-millis = 0
scroll-pause-millis = 0

[storage]
database-path = ":memory:"
"#
    );
    parse_config(&toml).unwrap()
}

/// In-memory storage holding the test identity, plus a store over it
pub(crate) fn test_credentials() -> (SharedStorage<SqliteStorage>, CredentialStore<SqliteStorage>, i64)
{
    let storage = share(SqliteStorage::new_in_memory().unwrap());
    let cipher = AesCipher::from_base64(&generate_key()).unwrap();
    let store = CredentialStore::new(Arc::clone(&storage), Arc::new(cipher));
    let id = store
        .create_identity("Harvest Bot", EMAIL, &SecretString::from(PASSWORD), None)
        .unwrap();
    (storage, store, id)
}

/// How a card reacts to its dismiss control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dismiss {
    Normal,
    StaleOnce,
    StaleAlways,
}

/// One job card on a result page
#[derive(Debug, Clone)]
pub(crate) struct FakeListing {
    pub href: String,
    pub title: String,
    pub company: Option<String>,
    pub location: String,
    pub dismiss: Dismiss,
}

impl FakeListing {
    pub fn new(id: u32) -> Self {
        Self {
            href: format!("https://jobs.test/jobs/view/{}/?refId=abc&trackingId=xyz", id),
            title: format!("Engineer {}", id),
            company: Some("Acme".to_string()),
            location: "São Paulo, Brasil (Remote)".to_string(),
            dismiss: Dismiss::Normal,
        }
    }

    pub fn canonical(id: u32) -> String {
        format!("https://jobs.test/jobs/view/{}", id)
    }

    pub fn dismiss(mut self, dismiss: Dismiss) -> Self {
        self.dismiss = dismiss;
        self
    }

    pub fn without_company(mut self) -> Self {
        self.company = None;
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }
}

#[derive(Default)]
struct SiteState {
    pages: Vec<Vec<FakeListing>>,
    summary_overrides: HashMap<u32, String>,
    hidden_indicator: HashSet<u32>,
    no_label_button: HashSet<u32>,
    no_sibling_button: HashSet<u32>,
    stuck_on: HashSet<u32>,
    login_form_missing: bool,
    captcha_on_login: bool,
    ready_timeouts: usize,
    crash_on_page: Option<u32>,
    dismissed: HashSet<String>,
    stale_consumed: HashSet<String>,
    navigations: Vec<String>,
    next_clicks: Vec<u32>,
    logins: usize,
    closed_contexts: usize,
}

impl SiteState {
    fn total(&self) -> u32 {
        self.pages.len() as u32
    }

    fn listing(&self, page: u32, index: usize) -> Option<&FakeListing> {
        self.pages.get(page.checked_sub(1)? as usize)?.get(index)
    }
}

/// Server side of the fake job site; clones share state
#[derive(Clone, Default)]
pub(crate) struct FakeSite(Arc<Mutex<SiteState>>);

impl FakeSite {
    pub fn with_pages(pages: Vec<Vec<FakeListing>>) -> Self {
        let site = Self::default();
        site.state().pages = pages;
        site
    }

    fn state(&self) -> MutexGuard<'_, SiteState> {
        self.0.lock().unwrap()
    }

    pub fn browser(&self) -> FakeBrowser {
        FakeBrowser {
            site: self.clone(),
            selectors: SelectorConfig::default(),
            ctx: Mutex::new(Context::default()),
        }
    }

    pub fn summary_text(&self, page: u32, text: &str) -> &Self {
        self.state().summary_overrides.insert(page, text.to_string());
        self
    }

    pub fn hide_indicator(&self, page: u32) -> &Self {
        self.state().hidden_indicator.insert(page);
        self
    }

    pub fn remove_label_button(&self, page: u32) -> &Self {
        self.state().no_label_button.insert(page);
        self
    }

    pub fn remove_sibling_button(&self, page: u32) -> &Self {
        self.state().no_sibling_button.insert(page);
        self
    }

    /// Next-page clicks from `page` are swallowed
    pub fn stick_on(&self, page: u32) -> &Self {
        self.state().stuck_on.insert(page);
        self
    }

    pub fn without_login_form(&self) -> &Self {
        self.state().login_form_missing = true;
        self
    }

    pub fn captcha_on_login(&self) -> &Self {
        self.state().captcha_on_login = true;
        self
    }

    /// The next `count` document-ready waits time out
    pub fn ready_timeouts(&self, count: usize) -> &Self {
        self.state().ready_timeouts = count;
        self
    }

    /// The tab crashes the first time items are listed on `page`
    pub fn crash_on_page(&self, page: u32) -> &Self {
        self.state().crash_on_page = Some(page);
        self
    }

    pub fn dismissed(&self) -> HashSet<String> {
        self.state().dismissed.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn next_clicks(&self) -> Vec<u32> {
        self.state().next_clicks.clone()
    }

    pub fn logins(&self) -> usize {
        self.state().logins
    }

    pub fn closed_contexts(&self) -> usize {
        self.state().closed_contexts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Location {
    #[default]
    Blank,
    Home,
    Login,
    Results(u32),
}

#[derive(Default)]
struct Context {
    location: Location,
    jar: Option<CookieBlob>,
    logged_in: bool,
    captcha: bool,
    typed_email: String,
    typed_password: String,
    scrolls: usize,
}

/// Element handles; result-page handles carry the page they were read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeElement {
    AuthMarker,
    Username,
    Password,
    Captcha,
    ActivePage(u32),
    NextButton(u32),
    Placeholder(u32, usize),
    Item(u32, usize),
    ActionIcon(u32, usize),
    TitleLink(u32, usize),
    TitleText(u32, usize),
    Company(u32, usize),
    Location(u32, usize),
    Dismiss(u32, usize),
}

impl FakeElement {
    fn page(&self) -> Option<u32> {
        match *self {
            Self::ActivePage(p)
            | Self::Placeholder(p, _)
            | Self::Item(p, _)
            | Self::ActionIcon(p, _)
            | Self::TitleLink(p, _)
            | Self::TitleText(p, _)
            | Self::Company(p, _)
            | Self::Location(p, _)
            | Self::Dismiss(p, _) => Some(p),
            Self::NextButton(target) => Some(target - 1),
            _ => None,
        }
    }
}

/// One browsing context on a [`FakeSite`]
pub(crate) struct FakeBrowser {
    site: FakeSite,
    selectors: SelectorConfig,
    ctx: Mutex<Context>,
}

impl FakeBrowser {
    fn ctx(&self) -> MutexGuard<'_, Context> {
        self.ctx.lock().unwrap()
    }

    /// Handles read before the last navigation no longer resolve
    fn check_live(&self, element: &FakeElement) -> BrowserResult<()> {
        match (element.page(), self.ctx().location) {
            (None, _) => Ok(()),
            (Some(page), Location::Results(current)) if page == current => Ok(()),
            _ => Err(BrowserError::Stale),
        }
    }

    fn rendered(&self, page: u32) -> usize {
        let len = self
            .site
            .state()
            .pages
            .get(page as usize - 1)
            .map_or(0, Vec::len);
        len.min(INITIALLY_RENDERED + self.ctx().scrolls * RENDERED_PER_SCROLL)
    }

    fn arrive(&self, location: Location) {
        let mut ctx = self.ctx();
        ctx.location = location;
        ctx.scrolls = 0;
        ctx.captcha = false;
        if ctx.jar.as_ref().map(CookieBlob::as_bytes) == Some(VALID_COOKIES) {
            ctx.logged_in = true;
        }
    }

    fn current_page(&self) -> Option<u32> {
        match self.ctx().location {
            Location::Results(page) => Some(page),
            _ => None,
        }
    }

    fn activate(&self, element: &FakeElement) -> BrowserResult<()> {
        self.check_live(element)?;
        match *element {
            FakeElement::NextButton(target) => {
                let from = target - 1;
                let stuck = {
                    let mut site = self.site.state();
                    site.next_clicks.push(target);
                    site.stuck_on.contains(&from)
                };
                if !stuck {
                    self.arrive(Location::Results(target));
                }
                Ok(())
            }
            FakeElement::Dismiss(page, index) => {
                let mut site = self.site.state();
                let listing = site
                    .listing(page, index)
                    .cloned()
                    .ok_or(BrowserError::Stale)?;
                match listing.dismiss {
                    Dismiss::StaleAlways => return Err(BrowserError::Stale),
                    Dismiss::StaleOnce if site.stale_consumed.insert(listing.href.clone()) => {
                        return Err(BrowserError::Stale)
                    }
                    _ => {}
                }
                site.dismissed.insert(listing.href);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserContext for FakeBrowser {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let location = {
            let mut site = self.site.state();
            site.navigations.push(url.to_string());
            if url.starts_with(LOGIN_URL) {
                Location::Login
            } else if url.starts_with(SEARCH_URL) && !site.pages.is_empty() {
                Location::Results(1)
            } else {
                Location::Home
            }
        };
        self.arrive(location);
        Ok(())
    }

    async fn reload(&self) -> BrowserResult<()> {
        let location = self.ctx().location;
        self.arrive(location);
        Ok(())
    }

    async fn wait_ready(&self, _timeout: Duration) -> BrowserResult<()> {
        let mut site = self.site.state();
        if site.ready_timeouts > 0 {
            site.ready_timeouts -= 1;
            return Err(BrowserError::Timeout("document ready".to_string()));
        }
        Ok(())
    }

    async fn find(&self, selector: &str) -> BrowserResult<Option<FakeElement>> {
        let s = &self.selectors;
        let (location, logged_in, captcha) = {
            let ctx = self.ctx();
            (ctx.location, ctx.logged_in, ctx.captcha)
        };
        let site = self.site.state();

        let found = match location {
            _ if selector == s.captcha => captcha.then_some(FakeElement::Captcha),
            Location::Home | Location::Results(_) if selector == s.authenticated_marker => {
                logged_in.then_some(FakeElement::AuthMarker)
            }
            Location::Login if selector == s.login_username => {
                (!site.login_form_missing).then_some(FakeElement::Username)
            }
            Location::Login if selector == s.login_password => {
                (!site.login_form_missing).then_some(FakeElement::Password)
            }
            Location::Results(page) if selector == s.active_page => {
                (!site.hidden_indicator.contains(&page)).then_some(FakeElement::ActivePage(page))
            }
            Location::Results(page) if selector == s.next_page_button(page + 1) => {
                (page < site.total() && !site.no_label_button.contains(&page))
                    .then_some(FakeElement::NextButton(page + 1))
            }
            Location::Results(page) if selector == s.next_page_sibling => {
                (page < site.total() && !site.no_sibling_button.contains(&page))
                    .then_some(FakeElement::NextButton(page + 1))
            }
            Location::Results(page) if selector == s.item => {
                drop(site);
                return Ok((self.rendered(page) > 0).then_some(FakeElement::Item(page, 0)));
            }
            _ => None,
        };
        Ok(found)
    }

    async fn find_all(&self, selector: &str) -> BrowserResult<Vec<FakeElement>> {
        let Some(page) = self.current_page() else {
            return Ok(self.find(selector).await?.into_iter().collect());
        };

        if selector == self.selectors.item {
            {
                let mut site = self.site.state();
                if site.crash_on_page == Some(page) {
                    site.crash_on_page = None;
                    return Err(BrowserError::Protocol("Target crashed".to_string()));
                }
            }
            return Ok((0..self.rendered(page))
                .map(|i| FakeElement::Item(page, i))
                .collect());
        }

        if selector == self.selectors.lazy_placeholder {
            let len = self
                .site
                .state()
                .pages
                .get(page as usize - 1)
                .map_or(0, Vec::len);
            return Ok((self.rendered(page)..len)
                .map(|i| FakeElement::Placeholder(page, i))
                .collect());
        }

        Ok(self.find(selector).await?.into_iter().collect())
    }

    async fn find_within(
        &self,
        parent: &FakeElement,
        selector: &str,
    ) -> BrowserResult<Option<FakeElement>> {
        self.check_live(parent)?;
        let s = &self.selectors;

        let found = match *parent {
            FakeElement::Item(p, i) if selector == s.item_action_icon => {
                Some(FakeElement::ActionIcon(p, i))
            }
            FakeElement::Item(p, i) if selector == s.item_title_link => {
                Some(FakeElement::TitleLink(p, i))
            }
            FakeElement::Item(p, i) if selector == s.item_company => {
                let has_company = self
                    .site
                    .state()
                    .listing(p, i)
                    .map_or(false, |l| l.company.is_some());
                has_company.then_some(FakeElement::Company(p, i))
            }
            FakeElement::Item(p, i) if selector == s.item_location => {
                Some(FakeElement::Location(p, i))
            }
            FakeElement::Item(p, i) if selector == s.dismiss_button => {
                Some(FakeElement::Dismiss(p, i))
            }
            FakeElement::TitleLink(p, i) if selector == s.item_title_text => {
                Some(FakeElement::TitleText(p, i))
            }
            _ => None,
        };
        Ok(found)
    }

    async fn execute_script(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let Some(page) = self.current_page() else {
            return Ok(serde_json::Value::Null);
        };

        if script == scripts::scroll_results(&self.selectors.results_container) {
            self.ctx().scrolls += 1;
            return Ok(serde_json::Value::Bool(true));
        }

        if script == scripts::text_content(&self.selectors.pagination_summary) {
            let site = self.site.state();
            let text = site
                .summary_overrides
                .get(&page)
                .cloned()
                .unwrap_or_else(|| format!("Page {} of {}", page, site.total()));
            return Ok(serde_json::Value::String(text));
        }

        Ok(serde_json::Value::Null)
    }

    async fn text(&self, element: &FakeElement) -> BrowserResult<String> {
        self.check_live(element)?;
        let site = self.site.state();
        let text = match *element {
            FakeElement::ActivePage(page) => page.to_string(),
            FakeElement::TitleText(p, i) => site.listing(p, i).map(|l| l.title.clone()).unwrap_or_default(),
            FakeElement::Company(p, i) => site
                .listing(p, i)
                .and_then(|l| l.company.clone())
                .unwrap_or_default(),
            FakeElement::Location(p, i) => site
                .listing(p, i)
                .map(|l| l.location.clone())
                .unwrap_or_default(),
            _ => String::new(),
        };
        Ok(text)
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> BrowserResult<Option<String>> {
        self.check_live(element)?;
        if name != "href" {
            return Ok(None);
        }
        let site = self.site.state();
        let value = match *element {
            FakeElement::ActionIcon(p, i) => site.listing(p, i).map(|l| {
                if site.dismissed.contains(&l.href) {
                    DISMISSED_ICON.to_string()
                } else {
                    self.selectors.pending_icon_ref.clone()
                }
            }),
            FakeElement::TitleLink(p, i) => site.listing(p, i).map(|l| l.href.clone()),
            _ => None,
        };
        Ok(value)
    }

    async fn click(&self, element: &FakeElement) -> BrowserResult<()> {
        self.activate(element)
    }

    async fn js_click(&self, element: &FakeElement) -> BrowserResult<()> {
        self.activate(element)
    }

    async fn send_keys(&self, element: &FakeElement, text: &str) -> BrowserResult<()> {
        let mut ctx = self.ctx();
        match element {
            FakeElement::Username => ctx.typed_email.push_str(text),
            FakeElement::Password => ctx.typed_password.push_str(text),
            _ => {}
        }
        Ok(())
    }

    async fn press_enter(&self, element: &FakeElement) -> BrowserResult<()> {
        if *element != FakeElement::Password {
            return Ok(());
        }
        let accepted = {
            let ctx = self.ctx();
            ctx.typed_email == EMAIL && ctx.typed_password == PASSWORD
        };
        if accepted {
            let captcha = {
                let mut site = self.site.state();
                site.logins += 1;
                site.captcha_on_login
            };
            self.arrive(Location::Home);
            let mut ctx = self.ctx();
            ctx.logged_in = true;
            ctx.captcha = captcha;
        }
        Ok(())
    }

    async fn scroll_into_view(&self, element: &FakeElement) -> BrowserResult<()> {
        self.check_live(element)
    }

    async fn export_cookies(&self) -> BrowserResult<CookieBlob> {
        if self.ctx().logged_in {
            Ok(CookieBlob(VALID_COOKIES.to_vec()))
        } else {
            Ok(CookieBlob(b"[]".to_vec()))
        }
    }

    async fn import_cookies(&self, cookies: &CookieBlob) -> BrowserResult<()> {
        self.ctx().jar = Some(cookies.clone());
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        self.site.state().closed_contexts += 1;
        Ok(())
    }
}

/// Hands out a fresh context on the same site for every launch
pub(crate) struct FakeLauncher {
    site: FakeSite,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Browser = FakeBrowser;

    async fn launch(&self) -> BrowserResult<FakeBrowser> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(self.site.browser())
    }
}
