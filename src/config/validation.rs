use crate::config::types::{BrowserConfig, Config, SelectorConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_email(&config.identity.email)?;
    validate_browser_config(&config.browser)?;
    validate_selectors(&config.selectors)?;

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.secrets.key_env.is_empty() {
        return Err(ConfigError::Validation("key_env cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates site endpoints
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.platform.trim().is_empty() {
        return Err(ConfigError::Validation(
            "platform cannot be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("base_url", &config.base_url),
        ("login_url", &config.login_url),
        ("search_url", &config.search_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} '{}' must use http or https",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates browser timing
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.scroll_attempts == 0 {
        return Err(ConfigError::Validation(
            "scroll_attempts must be >= 1".to_string(),
        ));
    }

    if let Some(remote) = &config.remote_url {
        Url::parse(remote)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid remote_url: {}", e)))?;
    }

    Ok(())
}

/// Rejects empty selectors
fn validate_selectors(selectors: &SelectorConfig) -> Result<(), ConfigError> {
    let named = [
        ("authenticated-marker", &selectors.authenticated_marker),
        ("login-username", &selectors.login_username),
        ("login-password", &selectors.login_password),
        ("captcha", &selectors.captcha),
        ("active-page", &selectors.active_page),
        ("pagination-summary", &selectors.pagination_summary),
        ("next-page-by-label", &selectors.next_page_by_label),
        ("next-page-sibling", &selectors.next_page_sibling),
        ("results-container", &selectors.results_container),
        ("lazy-placeholder", &selectors.lazy_placeholder),
        ("item", &selectors.item),
        ("item-action-icon", &selectors.item_action_icon),
        ("pending-icon-ref", &selectors.pending_icon_ref),
        ("item-title-link", &selectors.item_title_link),
        ("item-title-text", &selectors.item_title_text),
        ("item-company", &selectors.item_company),
        ("item-location", &selectors.item_location),
        ("dismiss-button", &selectors.dismiss_button),
    ];

    for (name, value) in named {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "selector '{}' cannot be empty",
                name
            )));
        }
    }

    if !selectors.next_page_by_label.contains("{page}") {
        return Err(ConfigError::Validation(
            "selector 'next-page-by-label' must contain a {page} placeholder".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
pub(crate) fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation("email cannot be empty".to_string()));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
