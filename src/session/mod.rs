//! Session Manager
//!
//! Produces an authenticated browsing context: stored cookies first, the
//! login form as fallback, and a human pause when a CAPTCHA shows up.

mod captcha;
mod manager;

pub use captcha::{CaptchaSignal, ConsoleCaptchaSignal};
pub use manager::Session;

#[cfg(test)]
pub(crate) use captcha::ImmediateCaptchaSignal;

use crate::FailureKind;
use std::fmt;
use thiserror::Error;

/// Login state machine
///
/// `Start -> CookiesInjected -> Verifying -> {Authenticated | LoginRequired}`,
/// `LoginRequired -> FormSubmitted -> {Authenticated | CaptchaPending}`,
/// `CaptchaPending -> Authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Start,
    CookiesInjected,
    Verifying,
    LoginRequired,
    FormSubmitted,
    CaptchaPending,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::CookiesInjected => "cookies-injected",
            Self::Verifying => "verifying",
            Self::LoginRequired => "login-required",
            Self::FormSubmitted => "form-submitted",
            Self::CaptchaPending => "captcha-pending",
            Self::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// Login failures
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("No identity with email {0}")]
    UnknownIdentity(String),

    #[error("Login form not found ({0})")]
    FormNotFound(String),

    #[error("Timed out during login: {0}")]
    Timeout(String),

    #[error("CAPTCHA signal lost: {0}")]
    CaptchaSignalLost(String),
}

impl LoginError {
    /// Missing identities and a dead operator channel will not be fixed by a
    /// fresh session
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::FormNotFound(_) | Self::Timeout(_) => Some(FailureKind::SessionFatal),
            Self::UnknownIdentity(_) | Self::CaptchaSignalLost(_) => None,
        }
    }
}
