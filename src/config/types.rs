use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Job-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Listing site endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Platform label stored with every listing and session artifact
    pub platform: String,

    /// Site root, visited first to receive cookies
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Credential form page
    #[serde(rename = "login-url")]
    pub login_url: String,

    /// Search results page; filters are appended as query parameters
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// Query parameters that are part of a listing's identity
    #[serde(rename = "canonical-keep-params", default)]
    pub canonical_keep_params: Vec<String>,
}

/// Which stored identity to authenticate as
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub email: String,
}

/// Default search filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
    pub location: Option<String>,
    pub keywords: Option<String>,
}

/// Browser process and timing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable
    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<String>,

    /// DevTools endpoint of an already running browser
    #[serde(rename = "remote-url")]
    pub remote_url: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Bound for every DOM wait (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause before reading a freshly rendered page (milliseconds)
    #[serde(rename = "settle-millis", default = "default_settle_millis")]
    pub settle_millis: u64,

    /// Maximum lazy-load scroll rounds per page
    #[serde(rename = "scroll-attempts", default = "default_scroll_attempts")]
    pub scroll_attempts: u32,

    /// Pause between lazy-load scroll rounds (milliseconds)
    #[serde(rename = "scroll-pause-millis", default = "default_scroll_pause_millis")]
    pub scroll_pause_millis: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_executable: None,
            remote_url: None,
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            settle_millis: default_settle_millis(),
            scroll_attempts: default_scroll_attempts(),
            scroll_pause_millis: default_scroll_pause_millis(),
        }
    }
}

impl BrowserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_millis)
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Where the credential encryption key comes from
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Environment variable holding the base64 key
    #[serde(rename = "key-env", default = "default_key_env")]
    pub key_env: String,

    /// Optional dotenv file loaded before the key is read
    #[serde(rename = "env-file")]
    pub env_file: Option<String>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            env_file: None,
        }
    }
}

/// Site-specific CSS selectors.
///
/// `{page}` in `next-page-by-label` is replaced with the target page number.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    pub authenticated_marker: String,
    pub login_username: String,
    pub login_password: String,
    pub captcha: String,
    pub active_page: String,
    pub pagination_summary: String,
    pub next_page_by_label: String,
    pub next_page_sibling: String,
    pub results_container: String,
    pub lazy_placeholder: String,
    pub item: String,
    pub item_action_icon: String,
    pub pending_icon_ref: String,
    pub item_title_link: String,
    pub item_title_text: String,
    pub item_company: String,
    pub item_location: String,
    pub dismiss_button: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            authenticated_marker: ".global-nav__me-photo".to_string(),
            login_username: "input[name='session_key']".to_string(),
            login_password: "input[name='session_password']".to_string(),
            captcha: ".captcha-challenge".to_string(),
            active_page: "li.artdeco-pagination__indicator--number.active.selected".to_string(),
            pagination_summary: ".artdeco-pagination__page-state".to_string(),
            next_page_by_label:
                "li.artdeco-pagination__indicator--number button[aria-label='Page {page}']"
                    .to_string(),
            next_page_sibling:
                "li.artdeco-pagination__indicator--number.active.selected + li button".to_string(),
            results_container: ".jobs-search-results-list".to_string(),
            lazy_placeholder: ".jobs-search-results__job-card-search--generic-occludable-area"
                .to_string(),
            item: "li.jobs-search-results__list-item".to_string(),
            item_action_icon: "button.job-card-container__action use".to_string(),
            pending_icon_ref: "#close-small".to_string(),
            item_title_link: "a.job-card-list__title".to_string(),
            item_title_text: "strong".to_string(),
            item_company: ".job-card-container__primary-description".to_string(),
            item_location: ".job-card-container__metadata-item".to_string(),
            dismiss_button: "button.artdeco-button:has(svg[data-test-icon='close-small'])"
                .to_string(),
        }
    }
}

impl SelectorConfig {
    /// Selector for the pagination button labelled with `page`
    pub fn next_page_button(&self, page: u32) -> String {
        self.next_page_by_label.replace("{page}", &page.to_string())
    }
}

fn default_headless() -> bool {
    false
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_settle_millis() -> u64 {
    3000
}

fn default_scroll_attempts() -> u32 {
    5
}

fn default_scroll_pause_millis() -> u64 {
    500
}

fn default_key_env() -> String {
    "JOB_HARVEST_SECRET_KEY".to_string()
}
