//! Job-Harvest: an unattended harvester for paginated, script-rendered job listings
//!
//! This crate drives a real browser through an authenticated session, walks
//! search result pages, and persists every distinct listing exactly once,
//! restarting cleanly from any transient failure.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod credentials;
pub mod output;
pub mod secrets;
pub mod session;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Job-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Secret error: {0}")]
    Secret(#[from] secrets::SecretError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Login failed: {0}")]
    Login(#[from] session::LoginError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure categories that the crawl supervisor recovers from by restarting
/// the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Element missing, stale, or a DOM wait that timed out
    DomTransient,
    /// The browsing context can no longer be trusted to be authenticated
    SessionFatal,
    /// A transactional scope rolled back
    PersistenceFatal,
}

impl HarvestError {
    /// Classifies the error for the supervisor.
    ///
    /// Returns `None` for errors that a fresh session cannot fix (bad
    /// configuration, missing identity, undecryptable credentials).
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Browser(e) => Some(e.failure_kind()),
            Self::Login(e) => e.failure_kind(),
            Self::Storage(_) => Some(FailureKind::PersistenceFatal),
            Self::Io(_) => Some(FailureKind::SessionFatal),
            Self::Config(_) | Self::Secret(_) | Self::UrlError(_) => None,
        }
    }

    /// Returns true if the supervisor should discard the session and retry
    pub fn is_restartable(&self) -> bool {
        self.failure_kind().is_some()
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Job-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Supervisor, Walker};
pub use session::{Session, SessionState};
pub use url::canonicalize_url;
